use std::collections::{HashMap, HashSet};

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::classify::text::TextCategorizer;
use crate::classify::taxonomy::TextCategory;
use crate::error::{PipelineError, Result};
use crate::ingest::records::RawRecord;
use crate::mapping::cleaner::Table;
use crate::mapping::entities::{Component, Device, Guide, MappedSchema, Step};
use crate::utils::config::{ColumnTokens, ComponentOwnership, FallbackDefaults, Mode, PipelineConfig};

/// Flattens heterogeneous records into devices, components, guides and steps.
pub struct SchemaMapper {
    tokens: ColumnTokens,
    fallbacks: FallbackDefaults,
    ownership: ComponentOwnership,
    mode: Mode,
    created_date: NaiveDate,
}

/// Device names seen so far, by surrogate id.
struct DeviceIndex {
    column: Option<usize>,
    ids: HashMap<String, i64>,
}

impl SchemaMapper {
    pub fn from_config(config: &PipelineConfig, mode: Mode) -> Self {
        Self {
            tokens: config.columns.clone(),
            fallbacks: config.fallbacks.clone(),
            ownership: config.component_ownership,
            mode,
            created_date: Local::now().date_naive(),
        }
    }

    pub fn with_created_date(mut self, date: NaiveDate) -> Self {
        self.created_date = date;
        self
    }

    pub fn map(&self, records: &[RawRecord]) -> Result<MappedSchema> {
        let table = Table::from_records(records);
        if table.is_empty() && self.mode.is_strict() {
            return Err(PipelineError::EmptyInput(
                "no non-empty records to map".to_string(),
            ));
        }
        info!(
            "Mapping {} rows across {} columns",
            table.rows.len(),
            table.columns.len()
        );

        let (devices, index) = self.extract_devices(&table)?;
        let components = self.extract_components(&table, &index);
        let guides = self.extract_guides(&table, &index)?;
        let steps = self.extract_steps(&table, &guides)?;

        info!(
            "Mapped {} devices, {} components, {} guides, {} steps",
            devices.len(),
            components.len(),
            guides.len(),
            steps.len()
        );

        Ok(MappedSchema {
            devices,
            components,
            guides,
            steps,
        })
    }

    fn extract_devices(&self, table: &Table) -> Result<(Vec<Device>, DeviceIndex)> {
        let cols = table.matching_columns(&self.tokens.device);
        let image_cols = table.matching_columns(&self.tokens.image);

        let mut devices: Vec<Device> = Vec::new();
        let mut ids = HashMap::new();
        if let Some(&first) = cols.first() {
            for row in 0..table.rows.len() {
                let Some(name) = table.cell(row, first) else {
                    continue;
                };
                if ids.contains_key(name) {
                    continue;
                }
                let id = devices.len() as i64 + 1;
                ids.insert(name.to_string(), id);
                devices.push(Device {
                    id,
                    name: name.to_string(),
                    device_type: self.fallbacks.device_type.clone(),
                    image_url: first_value(table, row, &image_cols),
                });
            }
        }

        if devices.is_empty() {
            self.require_fallback("device", &self.tokens.device, cols.is_empty())?;
            devices.push(Device {
                id: 1,
                name: self.fallbacks.device_name.clone(),
                device_type: self.fallbacks.device_type.clone(),
                image_url: None,
            });
        }

        Ok((
            devices,
            DeviceIndex {
                column: cols.first().copied(),
                ids,
            },
        ))
    }

    /// Owning device of a row. Always device 1 unless configured otherwise.
    fn row_device(&self, table: &Table, row: usize, index: &DeviceIndex) -> i64 {
        match self.ownership {
            ComponentOwnership::FirstDevice => 1,
            ComponentOwnership::DeviceColumn => {
                let id = index
                    .column
                    .and_then(|col| table.cell(row, col))
                    .and_then(|name| index.ids.get(name).copied());
                id.unwrap_or_else(|| {
                    warn!("Row {} has no device value, attaching to device 1", row + 1);
                    1
                })
            }
        }
    }

    fn extract_components(&self, table: &Table, index: &DeviceIndex) -> Vec<Component> {
        let cols = table.matching_columns(&self.tokens.component);
        if cols.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut components = Vec::new();
        for row in 0..table.rows.len() {
            let values = table.project(row, &cols);
            if values.iter().all(Option::is_none) {
                continue;
            }
            let device_id = self.row_device(table, row, index);
            if !seen.insert((device_id, values.clone())) {
                continue;
            }

            let id = components.len() as i64 + 1;
            let name = values[0]
                .clone()
                .unwrap_or_else(|| format!("Component_{}", id));
            let description = values[1..]
                .iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" | ");
            components.push(Component {
                id,
                device_id,
                name,
                description,
            });
        }
        components
    }

    fn extract_guides(&self, table: &Table, index: &DeviceIndex) -> Result<Vec<Guide>> {
        let cols = table.matching_columns(&self.tokens.guide);
        let url_cols = table.matching_columns(&self.tokens.url);

        let mut seen = HashSet::new();
        let mut guides = Vec::new();
        for row in 0..table.rows.len() {
            if cols.is_empty() {
                break;
            }
            let values = table.project(row, &cols);
            let Some(title) = values.iter().flatten().next().cloned() else {
                continue;
            };
            let device_id = self.row_device(table, row, index);
            if !seen.insert((device_id, values)) {
                continue;
            }
            guides.push(Guide {
                id: guides.len() as i64 + 1,
                device_id: Some(device_id),
                title,
                created_date: self.created_date,
                url: first_value(table, row, &url_cols),
                category: TextCategory::Other,
            });
        }

        if guides.is_empty() {
            self.require_fallback("guide", &self.tokens.guide, cols.is_empty())?;
            guides.push(Guide {
                id: 1,
                device_id: Some(1),
                title: self.fallbacks.guide_title.clone(),
                created_date: self.created_date,
                url: None,
                category: TextCategory::Other,
            });
        }
        Ok(guides)
    }

    /// Every guide receives the full step list, numbered from 1.
    fn extract_steps(&self, table: &Table, guides: &[Guide]) -> Result<Vec<Step>> {
        let cols = table.matching_columns(&self.tokens.step);

        let mut seen = HashSet::new();
        let mut descriptions: Vec<String> = Vec::new();
        for row in 0..table.rows.len() {
            if cols.is_empty() {
                break;
            }
            let values = table.project(row, &cols);
            let Some(text) = values.iter().flatten().next().cloned() else {
                continue;
            };
            if seen.insert(values) {
                descriptions.push(text);
            }
        }

        if descriptions.is_empty() {
            self.require_fallback("step", &self.tokens.step, cols.is_empty())?;
            descriptions = self.fallbacks.steps.clone();
        }

        let mut steps = Vec::with_capacity(guides.len() * descriptions.len());
        for guide in guides {
            for (n, description) in descriptions.iter().enumerate() {
                steps.push(Step {
                    id: steps.len() as i64 + 1,
                    guide_id: guide.id,
                    step_number: n as u32 + 1,
                    description: description.clone(),
                });
            }
        }
        Ok(steps)
    }

    /// Strict mode refuses to synthesize defaults.
    fn require_fallback(&self, entity: &str, tokens: &[String], no_columns: bool) -> Result<()> {
        if self.mode.is_strict() {
            return Err(if no_columns {
                PipelineError::MissingColumns {
                    entity: entity.to_string(),
                    tokens: tokens.to_vec(),
                }
            } else {
                PipelineError::EmptyInput(format!("{} columns hold no values", entity))
            });
        }
        warn!("No {} data in input, using default {} records", entity, entity);
        Ok(())
    }
}

fn first_value(table: &Table, row: usize, cols: &[usize]) -> Option<String> {
    cols.iter()
        .find_map(|&c| table.cell(row, c))
        .map(str::to_string)
}

/// Labels each guide by its title.
pub fn categorize_guides(schema: &mut MappedSchema, categorizer: &TextCategorizer) {
    for guide in &mut schema.guides {
        guide.category = categorizer.classify(&guide.title).category;
    }
}
