use std::fmt;

use serde::{Deserialize, Serialize};

/// Labels assigned to guide and search-result text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextCategory {
    #[serde(rename = "Pin Definitions")]
    PinDefinitions,
    #[serde(rename = "Programming Instructions")]
    ProgrammingInstructions,
    #[serde(rename = "Component Descriptions")]
    ComponentDescriptions,
    #[serde(rename = "Troubleshooting Tips")]
    TroubleshootingTips,
    #[serde(rename = "Other")]
    Other,
}

impl TextCategory {
    /// Declaration order. Keyword ties resolve to the earliest entry.
    pub const ALL: [TextCategory; 5] = [
        TextCategory::PinDefinitions,
        TextCategory::ProgrammingInstructions,
        TextCategory::ComponentDescriptions,
        TextCategory::TroubleshootingTips,
        TextCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextCategory::PinDefinitions => "Pin Definitions",
            TextCategory::ProgrammingInstructions => "Programming Instructions",
            TextCategory::ComponentDescriptions => "Component Descriptions",
            TextCategory::TroubleshootingTips => "Troubleshooting Tips",
            TextCategory::Other => "Other",
        }
    }

    /// Parses a free-form label such as a completion reply.
    /// Surrounding whitespace, quotes and a trailing period are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(cleaned))
    }
}

impl fmt::Display for TextCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels assigned to images; each doubles as the destination directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Pinouts,
    Tutorials,
    Components,
    Circuits,
    Other,
}

impl ImageCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageCategory::Pinouts => "pinouts",
            ImageCategory::Tutorials => "tutorials",
            ImageCategory::Components => "components",
            ImageCategory::Circuits => "circuits",
            ImageCategory::Other => "other",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One category and the keywords that vote for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule<C> {
    pub category: C,
    pub keywords: Vec<String>,
}

impl<C> KeywordRule<C> {
    pub fn new(category: C, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

pub fn default_text_rules() -> Vec<KeywordRule<TextCategory>> {
    vec![
        KeywordRule::new(
            TextCategory::PinDefinitions,
            &[
                "pin", "pinout", "gpio", "digital", "analog", "pwm", "i2c", "spi", "uart", "tx",
                "rx", "vcc", "gnd",
            ],
        ),
        KeywordRule::new(
            TextCategory::ProgrammingInstructions,
            &[
                "code",
                "program",
                "sketch",
                "void setup",
                "void loop",
                "function",
                "library",
                "digitalwrite",
                "analogread",
                "serial.begin",
            ],
        ),
        KeywordRule::new(
            TextCategory::ComponentDescriptions,
            &[
                "sensor",
                "led",
                "resistor",
                "capacitor",
                "motor",
                "display",
                "module",
                "transistor",
                "diode",
                "breadboard",
                "jumper",
            ],
        ),
        KeywordRule::new(
            TextCategory::TroubleshootingTips,
            &[
                "error",
                "problem",
                "fix",
                "debug",
                "solution",
                "issue",
                "won't work",
                "not working",
                "failed",
                "check",
                "verify",
            ],
        ),
    ]
}

pub fn default_image_rules() -> Vec<KeywordRule<ImageCategory>> {
    vec![
        KeywordRule::new(
            ImageCategory::Pinouts,
            &["pinout", "diagram", "pin", "layout", "schematic"],
        ),
        KeywordRule::new(
            ImageCategory::Tutorials,
            &["tutorial", "step", "guide", "instruction", "howto"],
        ),
        KeywordRule::new(
            ImageCategory::Components,
            &["component", "part", "sensor", "module", "board"],
        ),
        KeywordRule::new(
            ImageCategory::Circuits,
            &["circuit", "wiring", "connection", "breadboard"],
        ),
        KeywordRule::new(ImageCategory::Other, &[]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_is_forgiving() {
        assert_eq!(
            TextCategory::from_label("  \"pin definitions.\"\n"),
            Some(TextCategory::PinDefinitions)
        );
        assert_eq!(
            TextCategory::from_label("Troubleshooting Tips"),
            Some(TextCategory::TroubleshootingTips)
        );
        assert_eq!(TextCategory::from_label("Wiring"), None);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&TextCategory::ComponentDescriptions).unwrap();
        assert_eq!(json, "\"Component Descriptions\"");
        let json = serde_json::to_string(&ImageCategory::Pinouts).unwrap();
        assert_eq!(json, "\"pinouts\"");
    }
}
