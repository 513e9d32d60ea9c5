use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::ingest::records::load_json_array;
use crate::utils::config::Mode;

const UNKNOWN: &str = "Unknown";

/// Records from one side of a comparison.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub name: String,
    pub records: Vec<Value>,
    pub placeholder: bool,
}

impl SourceData {
    pub fn new(name: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            records,
            placeholder: false,
        }
    }

    /// Reads `path`, or substitutes `placeholder` when lenient and the file is absent.
    pub fn load(
        name: &str,
        path: &Path,
        placeholder: fn() -> Vec<Value>,
        mode: Mode,
    ) -> Result<Self> {
        match load_json_array(path) {
            Ok(records) => {
                info!("Loaded {} {} records from {:?}", records.len(), name, path);
                Ok(Self::new(name, records))
            }
            Err(PipelineError::MissingSource(_)) if !mode.is_strict() => {
                warn!("{:?} not found, comparing placeholder {} data", path, name);
                Ok(Self {
                    name: name.to_string(),
                    records: placeholder(),
                    placeholder: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub total_items: usize,
    pub categories: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, String>,
    pub placeholder: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryOverlap {
    pub common_categories: Vec<String>,
    pub unique_to_first: Vec<String>,
    pub unique_to_second: Vec<String>,
    pub total_overlap: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub first: SourceSummary,
    pub second: SourceSummary,
    pub comparison: CategoryOverlap,
    pub used_placeholder_data: bool,
}

fn category_of(item: &Value) -> String {
    item.get("category")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn summarize(source: &SourceData) -> SourceSummary {
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    for item in &source.records {
        *categories.entry(category_of(item)).or_default() += 1;
    }

    let total = source.records.len();
    let category_distribution = categories
        .iter()
        .map(|(cat, &count)| {
            let pct = count as f64 / total as f64 * 100.0;
            (cat.clone(), format!("{:.1}%", pct))
        })
        .collect();

    SourceSummary {
        name: source.name.clone(),
        total_items: total,
        categories,
        category_distribution,
        placeholder: source.placeholder,
    }
}

/// Category distributions of both sources and how their label sets overlap.
pub fn compare(first: &SourceData, second: &SourceData) -> ComparisonReport {
    let first_summary = summarize(first);
    let second_summary = summarize(second);

    let a: BTreeSet<&String> = first_summary.categories.keys().collect();
    let b: BTreeSet<&String> = second_summary.categories.keys().collect();
    let common_categories: Vec<String> = a.intersection(&b).map(|s| s.to_string()).collect();
    let comparison = CategoryOverlap {
        total_overlap: common_categories.len(),
        common_categories,
        unique_to_first: a.difference(&b).map(|s| s.to_string()).collect(),
        unique_to_second: b.difference(&a).map(|s| s.to_string()).collect(),
    };

    ComparisonReport {
        used_placeholder_data: first.placeholder || second.placeholder,
        first: first_summary,
        second: second_summary,
        comparison,
    }
}

pub fn log_summary(report: &ComparisonReport) {
    for summary in [&report.first, &report.second] {
        info!(
            "{}: {} items{}",
            summary.name,
            summary.total_items,
            if summary.placeholder { " (placeholder)" } else { "" }
        );
        for (cat, count) in &summary.categories {
            info!("  {}: {} ({})", cat, count, summary.category_distribution[cat]);
        }
    }
    info!(
        "Common: [{}] | only {}: [{}] | only {}: [{}]",
        report.comparison.common_categories.join(", "),
        report.first.name,
        report.comparison.unique_to_first.join(", "),
        report.second.name,
        report.comparison.unique_to_second.join(", ")
    );
}

pub fn placeholder_scraper_data() -> Vec<Value> {
    vec![
        json!({"component": "Arduino Uno", "type": "board", "description": "The most common Arduino board with 14 digital I/O pins and 6 analog inputs", "category": "Pin Definitions", "source": "scraper"}),
        json!({"component": "LED Blink Tutorial", "type": "tutorial", "description": "Learn how to make an LED blink with Arduino programming using digitalWrite function", "category": "Programming Instructions", "source": "scraper"}),
        json!({"component": "Resistor", "type": "component", "description": "Electronic component used to limit current in circuits, essential for protecting LEDs", "category": "Component Descriptions", "source": "scraper"}),
        json!({"component": "Arduino Not Detected Fix", "type": "troubleshooting", "description": "Solutions for when Arduino is not detected by computer: check drivers, USB cable, and port selection", "category": "Troubleshooting Tips", "source": "scraper"}),
    ]
}

pub fn placeholder_classified_data() -> Vec<Value> {
    vec![
        json!({"id": 1, "original": {"title": "Arduino Pinout Guide", "snippet": "Complete guide to Arduino pins and their functions"}, "category": "Pin Definitions", "source": "search"}),
        json!({"id": 2, "original": {"title": "How to Program Arduino", "snippet": "Step by step programming tutorial for beginners"}, "category": "Programming Instructions", "source": "search"}),
        json!({"id": 3, "original": {"title": "Arduino Components List", "snippet": "List of essential Arduino components and sensors for projects"}, "category": "Component Descriptions", "source": "search"}),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(name: &str, categories: &[&str]) -> SourceData {
        SourceData::new(
            name,
            categories.iter().map(|c| json!({"category": c})).collect(),
        )
    }

    fn pct_sum(summary: &SourceSummary) -> f64 {
        summary
            .category_distribution
            .values()
            .map(|p| p.trim_end_matches('%').parse::<f64>().unwrap())
            .sum()
    }

    #[test]
    fn test_overlap_and_percentages() {
        let first = source("scraper", &["A", "A", "B"]);
        let second = source("classified", &["A", "C", "C", "C"]);
        let report = compare(&first, &second);

        assert_eq!(report.comparison.common_categories, vec!["A"]);
        assert_eq!(report.comparison.unique_to_first, vec!["B"]);
        assert_eq!(report.comparison.unique_to_second, vec!["C"]);
        assert_eq!(report.comparison.total_overlap, 1);

        assert_eq!(report.first.category_distribution["A"], "66.7%");
        assert_eq!(report.second.category_distribution["C"], "75.0%");
        assert!((pct_sum(&report.first) - 100.0).abs() <= 0.1);
        assert!((pct_sum(&report.second) - 100.0).abs() <= 0.1);
        assert!(!report.used_placeholder_data);
    }

    #[test]
    fn test_items_without_category_count_as_unknown() {
        let first = SourceData::new("first", vec![json!({"title": "x"}), json!("bare")]);
        let report = compare(&first, &source("second", &[]));
        assert_eq!(report.first.categories[UNKNOWN], 2);
        assert_eq!(report.second.total_items, 0);
        assert!(report.second.category_distribution.is_empty());
    }

    #[test]
    fn test_missing_file_uses_flagged_placeholder() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("scraped.json");

        let lenient =
            SourceData::load("scraper", &missing, placeholder_scraper_data, Mode::Lenient).unwrap();
        assert!(lenient.placeholder);
        assert_eq!(lenient.records.len(), 4);

        let report = compare(&lenient, &source("classified", &["Pin Definitions"]));
        assert!(report.used_placeholder_data);
        assert!(report.first.placeholder);

        let strict = SourceData::load("scraper", &missing, placeholder_scraper_data, Mode::Strict);
        assert!(matches!(strict, Err(PipelineError::MissingSource(_))));
    }
}
