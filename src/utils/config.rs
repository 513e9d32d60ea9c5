use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::taxonomy::{
    default_image_rules, default_text_rules, ImageCategory, KeywordRule, TextCategory,
};

/// Whether missing input is an error or triggers synthetic defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Strict,
    #[default]
    Lenient,
}

impl Mode {
    pub fn from_flag(strict: bool) -> Self {
        if strict {
            Mode::Strict
        } else {
            Mode::Lenient
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Mode::Strict)
    }
}

/// Credentials and network knobs for the delegated classifier.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub request_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff: Duration,
}

impl Settings {
    /// Process environment wins; `.env` in the working directory fills the gaps.
    pub fn load() -> Self {
        let file_vars = match load_env_file(Path::new(".env")) {
            Ok(vars) => {
                info!("Loaded settings from .env");
                vars
            }
            Err(e) => {
                debug!("No usable .env file: {}", e);
                HashMap::new()
            }
        };
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_u64 = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            request_timeout: Duration::from_secs(parse_u64("REQUEST_TIMEOUT_SECS", 30)),
            retry_max_attempts: parse_u64("RETRY_MAX_ATTEMPTS", 3) as u32,
            retry_initial_backoff: Duration::from_millis(parse_u64("RETRY_INITIAL_MS", 500)),
        }
    }
}

/// Reads `KEY=VALUE` lines. Blank lines and `#` comments are skipped.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let reader = BufReader::new(file);

    let mut vars = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').to_string();
            vars.insert(key.trim().to_string(), value);
        }
    }
    Ok(vars)
}

/// Directory layout under the data root.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub raw: PathBuf,
    pub processed: PathBuf,
    pub outputs: PathBuf,
    pub scraped_images: PathBuf,
    pub classified_images: PathBuf,
    pub image_sources: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            raw: root.join("raw"),
            processed: root.join("processed"),
            outputs: root.join("outputs"),
            scraped_images: root.join("scraped_images"),
            classified_images: root.join("classified_images"),
            image_sources: root.join("image_sources"),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.raw, &self.processed, &self.outputs, &self.image_sources] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }
}

/// Column-name tokens that route raw columns to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnTokens {
    pub device: Vec<String>,
    pub component: Vec<String>,
    pub guide: Vec<String>,
    pub step: Vec<String>,
    pub url: Vec<String>,
    pub image: Vec<String>,
}

impl Default for ColumnTokens {
    fn default() -> Self {
        let owned = |tokens: &[&str]| tokens.iter().map(|t| t.to_string()).collect();
        Self {
            device: owned(&["device", "board", "arduino", "name"]),
            component: owned(&["component", "pin", "voltage", "current", "type"]),
            guide: owned(&["guide", "tutorial", "title", "instruction"]),
            step: owned(&["step", "instruction", "description", "procedure"]),
            url: owned(&["url", "link"]),
            image: owned(&["image"]),
        }
    }
}

/// Records synthesized when the input has nothing to offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackDefaults {
    pub device_name: String,
    pub device_type: String,
    pub guide_title: String,
    pub steps: Vec<String>,
}

impl Default for FallbackDefaults {
    fn default() -> Self {
        Self {
            device_name: "Arduino UNO R3".to_string(),
            device_type: "Microcontroller Board".to_string(),
            guide_title: "Getting Started with Arduino UNO".to_string(),
            steps: vec![
                "Connect the USB cable to your Arduino UNO".to_string(),
                "Install the Arduino IDE on your computer".to_string(),
                "Select your board in the Tools menu".to_string(),
                "Upload the first sketch".to_string(),
            ],
        }
    }
}

/// How extracted components and guides find their owning device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentOwnership {
    /// Everything belongs to device 1.
    #[default]
    FirstDevice,
    /// Each row is attached to the device named in its device column.
    DeviceColumn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub text_rules: Vec<KeywordRule<TextCategory>>,
    pub image_rules: Vec<KeywordRule<ImageCategory>>,
    pub columns: ColumnTokens,
    pub fallbacks: FallbackDefaults,
    pub component_ownership: ComponentOwnership,
    pub text_source: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_rules: default_text_rules(),
            image_rules: default_image_rules(),
            columns: ColumnTokens::default(),
            fallbacks: FallbackDefaults::default(),
            component_ownership: ComponentOwnership::default(),
            text_source: "search".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Built-in defaults unless a JSON override file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {:?}", path))?;
                let config = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config {:?}", path))?;
                info!("Loaded pipeline config from {:?}", path);
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_env_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".env");
        let mut file = File::create(&path)?;
        writeln!(file, "# credentials")?;
        writeln!(file, "OPENAI_API_KEY=\"sk-test\"")?;
        writeln!(file)?;
        writeln!(file, "REQUEST_TIMEOUT_SECS = 5")?;

        let vars = load_env_file(&path)?;
        assert_eq!(vars.get("OPENAI_API_KEY").map(String::as_str), Some("sk-test"));
        assert_eq!(vars.get("REQUEST_TIMEOUT_SECS").map(String::as_str), Some("5"));
        assert_eq!(vars.len(), 2);
        Ok(())
    }

    #[test]
    fn test_settings_defaults_and_overrides() {
        let settings = Settings::from_lookup(|key| match key {
            "OPENAI_BASE_URL" => Some("http://localhost:8001/v1/".to_string()),
            "REQUEST_TIMEOUT_SECS" => Some("7".to_string()),
            "OPENAI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(settings.openai_base_url, "http://localhost:8001/v1");
        assert_eq!(settings.request_timeout, Duration::from_secs(7));
        assert_eq!(settings.openai_model, "gpt-3.5-turbo");
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.retry_max_attempts, 3);
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{"fallbacks": {"device_name": "Arduino Nano"}, "component_ownership": "device_column"}"#,
        )?;

        let config = PipelineConfig::load(Some(&path))?;
        assert_eq!(config.fallbacks.device_name, "Arduino Nano");
        assert_eq!(config.fallbacks.device_type, "Microcontroller Board");
        assert_eq!(config.component_ownership, ComponentOwnership::DeviceColumn);
        assert_eq!(config.text_rules.len(), 4);
        Ok(())
    }
}
