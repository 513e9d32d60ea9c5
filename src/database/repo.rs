use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::classify::text::ClassifiedText;
use crate::database::schema::SCHEMA;
use crate::mapping::entities::MappedSchema;
use crate::media::organizer::ClassifiedImage;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogCounts {
    pub devices: i64,
    pub device_guides: i64,
    pub unattached_guides: i64,
    pub components: i64,
    pub steps: i64,
    pub classified_images: i64,
}

/// SQLite home for mapped entities, classified text and organized images.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).context("Failed to open database")?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize schema")?;
        Ok(Self { conn })
    }

    /// Writes one mapping run in a single transaction. Devices are upserted by
    /// name; the run's surrogate ids are remapped to row ids.
    pub fn insert_schema(&mut self, schema: &MappedSchema) -> Result<()> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;

        {
            let mut stmt_device = tx.prepare(
                "INSERT INTO devices (name, device_type, image_url) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    device_type = excluded.device_type,
                    image_url = COALESCE(excluded.image_url, devices.image_url)
                 RETURNING id",
            )?;
            let mut stmt_component = tx.prepare(
                "INSERT INTO components (device_id, name, description) VALUES (?1, ?2, ?3)",
            )?;
            let mut stmt_guide = tx.prepare(
                "INSERT INTO guides (device_id, title, date_created, url, category)
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
            )?;
            let mut stmt_step = tx.prepare(
                "INSERT INTO steps (guide_id, step_number, description) VALUES (?1, ?2, ?3)",
            )?;

            let mut device_ids: HashMap<i64, i64> = HashMap::new();
            for device in &schema.devices {
                let row_id: i64 = stmt_device
                    .query_row(
                        params![device.name, device.device_type, device.image_url],
                        |row| row.get(0),
                    )
                    .with_context(|| format!("Failed to upsert device {}", device.name))?;
                device_ids.insert(device.id, row_id);
            }

            let lookup_device = |local: i64| {
                device_ids
                    .get(&local)
                    .copied()
                    .with_context(|| format!("Unknown device id {}", local))
            };

            for component in &schema.components {
                stmt_component.execute(params![
                    lookup_device(component.device_id)?,
                    component.name,
                    component.description
                ])?;
            }

            let mut guide_ids: HashMap<i64, i64> = HashMap::new();
            for guide in &schema.guides {
                let device_id = guide.device_id.map(lookup_device).transpose()?;
                let row_id: i64 = stmt_guide.query_row(
                    params![
                        device_id,
                        guide.title,
                        guide.created_date.to_string(),
                        guide.url,
                        guide.category.as_str()
                    ],
                    |row| row.get(0),
                )?;
                guide_ids.insert(guide.id, row_id);
            }

            for step in &schema.steps {
                let guide_id = guide_ids
                    .get(&step.guide_id)
                    .copied()
                    .with_context(|| format!("Unknown guide id {}", step.guide_id))?;
                stmt_step.execute(params![guide_id, step.step_number, step.description])?;
            }
        }

        tx.commit().context("Failed to commit transaction")?;
        Ok(())
    }

    /// Classified search results become guides with no device.
    pub fn insert_classified_texts(&mut self, items: &[ClassifiedText]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let today = Local::now().date_naive().to_string();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO guides (device_id, title, date_created, url, category)
                 VALUES (NULL, ?1, ?2, ?3, ?4)",
            )?;
            for item in items {
                let title = item.title().unwrap_or(item.text_preview.as_str());
                stmt.execute(params![title, today, item.link(), item.category.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    /// Organized images keyed by content hash; a re-run updates the stored copy.
    pub fn insert_images(&mut self, images: &[ClassifiedImage]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO classified_images
                    (hash_sha256, filename, source_path, stored_path, category, confidence, width, height)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(hash_sha256) DO UPDATE SET
                    stored_path = excluded.stored_path,
                    category = excluded.category,
                    confidence = excluded.confidence",
            )?;
            for image in images {
                let (Some(hash), Some(stored)) = (&image.sha256, &image.new_path) else {
                    continue;
                };
                let features = image.feature_snapshot.as_ref();
                stmt.execute(params![
                    hash,
                    image.filename,
                    image.source_path,
                    stored,
                    image.category.dir_name(),
                    image.confidence,
                    features.map(|f| f.width),
                    features.map(|f| f.height)
                ])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn counts(&self) -> Result<CatalogCounts> {
        let count = |sql: &str| -> Result<i64> {
            self.conn
                .query_row(sql, [], |row| row.get(0))
                .with_context(|| format!("Failed to run {}", sql))
        };
        Ok(CatalogCounts {
            devices: count("SELECT COUNT(*) FROM devices")?,
            device_guides: count("SELECT COUNT(*) FROM guides WHERE device_id IS NOT NULL")?,
            unattached_guides: count("SELECT COUNT(*) FROM guides WHERE device_id IS NULL")?,
            components: count("SELECT COUNT(*) FROM components")?,
            steps: count("SELECT COUNT(*) FROM steps")?,
            classified_images: count("SELECT COUNT(*) FROM classified_images")?,
        })
    }
}
