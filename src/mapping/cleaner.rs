use std::collections::HashSet;

use serde_json::Value;

use crate::ingest::records::RawRecord;

/// Records flattened onto one shared, ordered column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Normalizes column names and cell values, then drops empty and
    /// duplicate rows. Columns follow first-seen order across records.
    pub fn from_records(records: &[RawRecord]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let normalized: Vec<Vec<(usize, Option<String>)>> = records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .map(|(key, value)| {
                        let name = normalize_column(key);
                        let idx = match columns.iter().position(|c| *c == name) {
                            Some(idx) => idx,
                            None => {
                                columns.push(name);
                                columns.len() - 1
                            }
                        };
                        (idx, normalize_value(value))
                    })
                    .collect()
            })
            .collect();

        let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
        let mut rows = Vec::new();
        for cells in normalized {
            let mut row = vec![None; columns.len()];
            for (idx, value) in cells {
                // a later duplicate key after normalization only fills gaps
                if row[idx].is_none() {
                    row[idx] = value;
                }
            }
            if row.iter().all(Option::is_none) {
                continue;
            }
            if seen.insert(row.clone()) {
                rows.push(row);
            }
        }

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices of columns whose name contains any token, in column order.
    pub fn matching_columns(&self, tokens: &[String]) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, name)| tokens.iter().any(|t| name.contains(t.as_str())))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|v| v.as_deref())
    }

    pub fn project(&self, row: usize, cols: &[usize]) -> Vec<Option<String>> {
        cols.iter()
            .map(|&c| self.cell(row, c).map(str::to_string))
            .collect()
    }
}

pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn normalize_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<RawRecord> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_columns_are_normalized_in_first_seen_order() {
        let table = Table::from_records(&records(json!([
            {" Board Name ": "Uno", "Pin Count": 20},
            {"Voltage": "5V", "board name": "Nano"}
        ])));
        assert_eq!(table.columns, vec!["board_name", "pin_count", "voltage"]);
        assert_eq!(table.rows[1], vec![Some("Nano".into()), None, Some("5V".into())]);
        assert_eq!(table.cell(0, 1), Some("20"));
    }

    #[test]
    fn test_empty_and_duplicate_rows_are_dropped() {
        let table = Table::from_records(&records(json!([
            {"name": " Uno ", "pin": "D13"},
            {"name": "", "pin": null},
            {"name": "Uno", "pin": "D13"},
            {"name": "Uno", "pin": "A0"}
        ])));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 0), Some("Uno"));
        assert_eq!(table.cell(1, 1), Some("A0"));
    }

    #[test]
    fn test_matching_columns_uses_substrings() {
        let table = Table::from_records(&records(json!([
            {"component_name": "LED", "title": "Blink", "device_type": "board"}
        ])));
        let tokens = vec!["name".to_string(), "device".to_string()];
        assert_eq!(table.matching_columns(&tokens), vec![0, 2]);
        assert!(table.matching_columns(&["step".to_string()]).is_empty());
    }
}
