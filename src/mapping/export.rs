use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::mapping::entities::MappedSchema;

/// `'it''s'` style literal.
pub fn sql_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn sql_optional(value: Option<&str>) -> String {
    value.map(sql_text).unwrap_or_else(|| "NULL".to_string())
}

fn sql_optional_id(value: Option<i64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "NULL".to_string())
}

/// One INSERT per record, grouped by table, parents before children.
pub fn render_sql_inserts(schema: &MappedSchema) -> String {
    let mut out = String::new();

    out.push_str("-- DEVICES\n");
    for d in &schema.devices {
        let _ = writeln!(
            out,
            "INSERT INTO Devices (DeviceID, DeviceName, DeviceType, ImageURL) VALUES ({}, {}, {}, {});",
            d.id,
            sql_text(&d.name),
            sql_text(&d.device_type),
            sql_optional(d.image_url.as_deref())
        );
    }

    out.push_str("\n-- COMPONENTS\n");
    for c in &schema.components {
        let _ = writeln!(
            out,
            "INSERT INTO Components (ComponentID, DeviceID, ComponentName, Description) VALUES ({}, {}, {}, {});",
            c.id,
            c.device_id,
            sql_text(&c.name),
            sql_text(&c.description)
        );
    }

    out.push_str("\n-- GUIDES\n");
    for g in &schema.guides {
        let _ = writeln!(
            out,
            "INSERT INTO Guides (GuideID, DeviceID, Title, DateCreated, GuideURL, Category) VALUES ({}, {}, {}, {}, {}, {});",
            g.id,
            sql_optional_id(g.device_id),
            sql_text(&g.title),
            sql_text(&g.created_date.to_string()),
            sql_optional(g.url.as_deref()),
            sql_text(g.category.as_str())
        );
    }

    out.push_str("\n-- STEPS\n");
    for s in schema.guides.iter().flat_map(|g| schema.steps_for(g.id)) {
        let _ = writeln!(
            out,
            "INSERT INTO Steps (StepID, GuideID, StepNumber, Description) VALUES ({}, {}, {}, {});",
            s.id,
            s.guide_id,
            s.step_number,
            sql_text(&s.description)
        );
    }

    out
}

pub fn to_json(schema: &MappedSchema) -> Result<String> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// Overwrites `cleaned_data.json` and `database_inserts.sql`.
pub fn write_outputs(
    schema: &MappedSchema,
    processed_dir: &Path,
    outputs_dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(processed_dir)?;
    fs::create_dir_all(outputs_dir)?;

    let json_path = processed_dir.join("cleaned_data.json");
    fs::write(&json_path, to_json(schema)?)?;
    info!("Saved cleaned data to {:?}", json_path);

    let sql_path = outputs_dir.join("database_inserts.sql");
    fs::write(&sql_path, render_sql_inserts(schema))?;
    info!("Saved SQL inserts to {:?}", sql_path);

    Ok((json_path, sql_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::taxonomy::TextCategory;
    use crate::mapping::entities::{Component, Device, Guide, Step};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn schema() -> MappedSchema {
        MappedSchema {
            devices: vec![Device {
                id: 1,
                name: "Arduino UNO R3".into(),
                device_type: "Microcontroller Board".into(),
                image_url: None,
            }],
            components: vec![Component {
                id: 1,
                device_id: 1,
                name: "D13".into(),
                description: "Built-in LED | 5V".into(),
            }],
            guides: vec![Guide {
                id: 1,
                device_id: None,
                title: "O'Reilly's guide".into(),
                created_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                url: None,
                category: TextCategory::Other,
            }],
            steps: vec![Step {
                id: 1,
                guide_id: 1,
                step_number: 1,
                description: "Don't skip the resistor".into(),
            }],
        }
    }

    #[test]
    fn test_quotes_are_doubled() {
        let sql = render_sql_inserts(&schema());
        assert!(sql.contains("'O''Reilly''s guide'"));
        assert!(sql.contains("'Don''t skip the resistor'"));
    }

    #[test]
    fn test_missing_optionals_render_null() {
        let sql = render_sql_inserts(&schema());
        assert!(sql.contains(
            "VALUES (1, 'Arduino UNO R3', 'Microcontroller Board', NULL);"
        ));
        assert!(sql.contains("VALUES (1, NULL, 'O''Reilly''s guide', '2024-03-09', NULL, 'Other');"));
        assert_eq!(sql.matches("INSERT INTO").count(), 4);
    }

    #[test]
    fn test_json_document_shape() {
        let value: serde_json::Value = serde_json::from_str(&to_json(&schema()).unwrap()).unwrap();
        assert_eq!(value["devices"][0]["type"], "Microcontroller Board");
        assert_eq!(value["guides"][0]["created_date"], "2024-03-09");
        assert_eq!(value["guides"][0]["category"], "Other");
        assert!(value["guides"][0]["device_id"].is_null());
    }

    #[test]
    fn test_outputs_are_overwritten() {
        let dir = TempDir::new().unwrap();
        let (json_path, sql_path) =
            write_outputs(&schema(), &dir.path().join("processed"), &dir.path().join("outputs")).unwrap();
        let mut smaller = schema();
        smaller.steps.clear();
        write_outputs(&smaller, &dir.path().join("processed"), &dir.path().join("outputs")).unwrap();

        let sql = fs::read_to_string(sql_path).unwrap();
        assert_eq!(sql.matches("INSERT INTO Steps").count(), 0);
        let json = fs::read_to_string(json_path).unwrap();
        assert!(json.contains("\"steps\": []"));
    }
}
