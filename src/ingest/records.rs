use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PipelineError, Result};

pub type RawRecord = Map<String, Value>;

/// Reads a JSON array. Non-object entries are kept as-is.
pub fn load_json_array(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(PipelineError::MissingSource(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Array(items) => Ok(items),
        other => Err(PipelineError::Config(format!(
            "{:?} holds a JSON {}, expected an array",
            path,
            kind(&other)
        ))),
    }
}

/// Reads tabular records: a JSON array of objects with string keys.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let items = load_json_array(path)?;
    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if records.len() < total {
        warn!(
            "Skipped {} non-object entries in {:?}",
            total - records.len(),
            path
        );
    }
    Ok(records)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_records_keeps_key_order_and_skips_scalars() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.json");
        fs::write(&path, r#"[{"zeta": 1, "alpha": "x"}, "stray", {"beta": null}]"#).unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_non_array_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.json");
        fs::write(&path, r#"{"devices": []}"#).unwrap();
        assert!(matches!(load_json_array(&path), Err(PipelineError::Config(_))));
        assert!(matches!(
            load_json_array(&dir.path().join("nope.json")),
            Err(PipelineError::MissingSource(_))
        ));
    }
}
