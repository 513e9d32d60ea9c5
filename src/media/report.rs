use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::classify::taxonomy::ImageCategory;
use crate::media::organizer::ClassifiedImage;

#[derive(Debug, Serialize)]
pub struct ReportSettings {
    pub categories: Vec<ImageCategory>,
}

#[derive(Debug, Serialize)]
pub struct ClassificationReport {
    pub classification_date: DateTime<Utc>,
    pub total_images: usize,
    pub successfully_classified: usize,
    pub errors: usize,
    pub category_distribution: BTreeMap<ImageCategory, usize>,
    pub images: Vec<ClassifiedImage>,
    pub settings: ReportSettings,
}

impl ClassificationReport {
    pub fn new(images: Vec<ClassifiedImage>, categories: Vec<ImageCategory>) -> Self {
        let successfully_classified = images.iter().filter(|i| i.organized).count();
        let mut category_distribution = BTreeMap::new();
        for image in images.iter().filter(|i| i.organized) {
            *category_distribution.entry(image.category).or_insert(0) += 1;
        }
        Self {
            classification_date: Utc::now(),
            total_images: images.len(),
            successfully_classified,
            errors: images.len() - successfully_classified,
            category_distribution,
            images,
            settings: ReportSettings { categories },
        }
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join("classification_report.json");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Classification report saved to {:?}", path);
        Ok(path)
    }

    pub fn log_summary(&self) {
        info!(
            "Images: {} processed, {} classified, {} errors",
            self.total_images, self.successfully_classified, self.errors
        );
        for (category, count) in &self.category_distribution {
            let pct = *count as f64 / self.successfully_classified as f64 * 100.0;
            info!("  {}: {} images ({:.1}%)", category, count, pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::image::{ImageCategorizer, ImageMethod};
    use crate::classify::taxonomy::default_image_rules;
    use tempfile::TempDir;

    fn image(name: &str, category: ImageCategory, organized: bool) -> ClassifiedImage {
        ClassifiedImage {
            filename: name.to_string(),
            source_path: name.to_string(),
            category,
            confidence: if organized { 0.8 } else { 0.0 },
            classification_method: if organized {
                ImageMethod::Filename
            } else {
                ImageMethod::Failed
            },
            feature_snapshot: None,
            sha256: None,
            new_path: organized.then(|| format!("{}/{}", category, name)),
            organized,
            error: (!organized).then(|| "decode failed".to_string()),
        }
    }

    #[test]
    fn test_report_counts_and_file() {
        let report = ClassificationReport::new(
            vec![
                image("a.png", ImageCategory::Pinouts, true),
                image("b.png", ImageCategory::Pinouts, true),
                image("c.png", ImageCategory::Other, false),
            ],
            ImageCategorizer::new(&default_image_rules()).categories(),
        );
        assert_eq!(report.total_images, 3);
        assert_eq!(report.successfully_classified, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.category_distribution[&ImageCategory::Pinouts], 2);
        assert!(!report.category_distribution.contains_key(&ImageCategory::Other));

        let dir = TempDir::new().unwrap();
        let path = report.save(dir.path()).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["category_distribution"]["pinouts"], 2);
        assert_eq!(saved["images"][0]["new_path"], "pinouts/a.png");
        assert_eq!(saved["images"][2]["error"], "decode failed");
        assert_eq!(saved["settings"]["categories"][0], "pinouts");
    }
}
