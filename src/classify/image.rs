use std::fs;
use std::path::Path;

use image::{GenericImageView, ImageReader};
use serde::Serialize;
use tracing::debug;

use crate::classify::taxonomy::{ImageCategory, KeywordRule};
use crate::error::Result;
use crate::media::mimetype;

const FILENAME_CONFIDENCE: f64 = 0.8;
const FEATURE_CONFIDENCE: f64 = 0.6;

/// Geometry and size of a decoded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageFeatures {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub size_kb: f64,
    pub format: String,
    pub is_wide: bool,
}

impl ImageFeatures {
    pub fn new(width: u32, height: u32, size_bytes: u64, format: String) -> Self {
        let aspect_ratio = if height > 0 {
            width as f64 / height as f64
        } else {
            0.0
        };
        Self {
            width,
            height,
            aspect_ratio,
            size_kb: size_bytes as f64 / 1024.0,
            format,
            is_wide: width > height && width > 800,
        }
    }

    /// Decodes the whole file; a truncated or corrupt body is an error.
    /// The decoder is chosen from the leading bytes, not the extension.
    pub fn extract(path: &Path) -> Result<Self> {
        let size_bytes = fs::metadata(path)?.len();
        let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let (width, height) = decoded.dimensions();
        let format = mimetype::detect_mimetype(path)
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Self::new(width, height, size_bytes, format))
    }

    pub fn category(&self) -> ImageCategory {
        if self.is_wide {
            ImageCategory::Pinouts
        } else if 0.8 < self.aspect_ratio && self.aspect_ratio < 1.2 && self.size_kb < 500.0 {
            ImageCategory::Components
        } else if self.width as f64 > self.height as f64 * 1.5 {
            ImageCategory::Tutorials
        } else {
            ImageCategory::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMethod {
    Filename,
    Features,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub category: ImageCategory,
    pub confidence: f64,
    pub method: ImageMethod,
    pub features: Option<ImageFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ImageCategorizer {
    rules: Vec<KeywordRule<ImageCategory>>,
}

impl ImageCategorizer {
    pub fn new(rules: &[KeywordRule<ImageCategory>]) -> Self {
        let rules = rules
            .iter()
            .map(|r| KeywordRule {
                category: r.category,
                keywords: r.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn categories(&self) -> Vec<ImageCategory> {
        let mut out: Vec<ImageCategory> = self.rules.iter().map(|r| r.category).collect();
        if !out.contains(&ImageCategory::Other) {
            out.push(ImageCategory::Other);
        }
        out
    }

    pub fn classify_filename(&self, filename: &str) -> Option<ImageCategory> {
        let lowered = filename.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|rule| rule.category)
    }

    /// Filename keywords first; image geometry only when no keyword matches.
    pub fn classify(&self, path: &Path, filename: &str) -> ClassificationResult {
        if let Some(category) = self.classify_filename(filename) {
            return ClassificationResult {
                category,
                confidence: FILENAME_CONFIDENCE,
                method: ImageMethod::Filename,
                features: None,
                error: None,
            };
        }

        match ImageFeatures::extract(path) {
            Ok(features) => ClassificationResult {
                category: features.category(),
                confidence: FEATURE_CONFIDENCE,
                method: ImageMethod::Features,
                features: Some(features),
                error: None,
            },
            Err(e) => {
                debug!("Feature extraction failed for {:?}: {}", path, e);
                ClassificationResult {
                    category: ImageCategory::Other,
                    confidence: 0.0,
                    method: ImageMethod::Failed,
                    features: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::taxonomy::default_image_rules;
    use image::{ImageFormat, RgbImage};
    use tempfile::TempDir;

    fn categorizer() -> ImageCategorizer {
        ImageCategorizer::new(&default_image_rules())
    }

    #[test]
    fn test_filename_keywords_in_declaration_order() {
        let c = categorizer();
        assert_eq!(c.classify_filename("UNO_Pinout.PNG"), Some(ImageCategory::Pinouts));
        // "pin" (pinouts) is declared before "board" (components)
        assert_eq!(c.classify_filename("board_pins.jpg"), Some(ImageCategory::Pinouts));
        assert_eq!(c.classify_filename("wiring.jpg"), Some(ImageCategory::Circuits));
        assert_eq!(c.classify_filename("photo_001.jpg"), None);
    }

    #[test]
    fn test_feature_rules() {
        let wide = ImageFeatures::new(1000, 400, 50 * 1024, "image/png".into());
        assert_eq!(wide.category(), ImageCategory::Pinouts);

        let square = ImageFeatures::new(300, 300, 100 * 1024, "image/png".into());
        assert_eq!(square.aspect_ratio, 1.0);
        assert_eq!(square.category(), ImageCategory::Components);

        let heavy_square = ImageFeatures::new(300, 300, 900 * 1024, "image/png".into());
        assert_eq!(heavy_square.category(), ImageCategory::Other);

        let banner = ImageFeatures::new(700, 400, 10 * 1024, "image/png".into());
        assert_eq!(banner.category(), ImageCategory::Tutorials);

        let tall = ImageFeatures::new(400, 900, 10 * 1024, "image/png".into());
        assert_eq!(tall.category(), ImageCategory::Other);

        assert_eq!(ImageFeatures::new(10, 0, 0, String::new()).aspect_ratio, 0.0);
    }

    #[test]
    fn test_classify_decodes_when_filename_is_silent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img_001.png");
        RgbImage::new(1000, 400).save(&path).unwrap();

        let result = categorizer().classify(&path, "img_001.png");
        assert_eq!(result.category, ImageCategory::Pinouts);
        assert_eq!(result.confidence, FEATURE_CONFIDENCE);
        let features = result.features.unwrap();
        assert_eq!((features.width, features.height), (1000, 400));
        assert_eq!(features.format, "image/png");
    }

    #[test]
    fn test_mislabelled_extension_still_decodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img_001.jpg");
        RgbImage::new(1000, 400)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let result = categorizer().classify(&path, "img_001.jpg");
        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.category, ImageCategory::Pinouts);
        assert_eq!(result.confidence, FEATURE_CONFIDENCE);
        assert_eq!(result.method, ImageMethod::Features);
        assert_eq!(result.features.unwrap().format, "image/png");
    }

    #[test]
    fn test_filename_match_skips_decoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("led_sensor.png");
        fs::write(&path, b"not an image").unwrap();

        let result = categorizer().classify(&path, "led_sensor.png");
        assert_eq!(result.category, ImageCategory::Components);
        assert_eq!(result.confidence, FILENAME_CONFIDENCE);
        assert!(result.features.is_none());
    }

    #[test]
    fn test_corrupt_image_is_other_with_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img_002.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\ngarbage").unwrap();

        let result = categorizer().classify(&path, "img_002.png");
        assert_eq!(result.category, ImageCategory::Other);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.method, ImageMethod::Failed);
        assert!(result.features.is_none());
        assert!(result.error.is_some());
    }
}
