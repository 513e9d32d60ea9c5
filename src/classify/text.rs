use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::classify::completion::{CompletionPrompt, TextCompletion};
use crate::classify::taxonomy::{KeywordRule, TextCategory};
use crate::error::{PipelineError, Result};
use crate::ingest::records::load_json_array;
use crate::utils::config::Mode;

const MIN_TEXT_CHARS: usize = 10;
const DELEGATED_MAX_CHARS: usize = 500;
const DELEGATED_CONFIDENCE: f64 = 0.9;
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMethod {
    Keyword,
    Delegated,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextClassification {
    pub category: TextCategory,
    pub confidence: f64,
    pub method: TextMethod,
}

impl TextClassification {
    fn other(method: TextMethod) -> Self {
        Self {
            category: TextCategory::Other,
            confidence: 0.0,
            method,
        }
    }
}

struct CompiledRule {
    category: TextCategory,
    keywords: Vec<(String, Regex)>,
}

/// Keyword scorer with an optional delegated completion backend.
pub struct TextCategorizer {
    rules: Vec<CompiledRule>,
    delegate: Option<Box<dyn TextCompletion>>,
}

impl TextCategorizer {
    /// Rules are scored in the order given; the first rule wins a tie.
    pub fn new(rules: &[KeywordRule<TextCategory>]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let mut keywords = Vec::with_capacity(rule.keywords.len());
            for keyword in &rule.keywords {
                let keyword = keyword.to_lowercase();
                let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&keyword)))?;
                keywords.push((keyword, pattern));
            }
            compiled.push(CompiledRule {
                category: rule.category,
                keywords,
            });
        }
        Ok(Self {
            rules: compiled,
            delegate: None,
        })
    }

    pub fn with_delegate(mut self, delegate: Box<dyn TextCompletion>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn is_delegated(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn classify(&self, text: &str) -> TextClassification {
        if text.trim().chars().count() < MIN_TEXT_CHARS {
            return TextClassification::other(TextMethod::Skipped);
        }

        if let Some(delegate) = &self.delegate {
            match self.classify_delegated(delegate.as_ref(), text) {
                Some(result) => return result,
                None => debug!("Delegated classification unavailable, using keywords"),
            }
        }

        self.classify_keywords(text)
    }

    /// Whole-word hits score 2, bare substring hits score 1.
    pub fn classify_keywords(&self, text: &str) -> TextClassification {
        let lowered = text.to_lowercase();

        let mut best: Option<(&CompiledRule, usize)> = None;
        for rule in &self.rules {
            let score: usize = rule
                .keywords
                .iter()
                .map(|(keyword, pattern)| {
                    if pattern.is_match(&lowered) {
                        2
                    } else if lowered.contains(keyword.as_str()) {
                        1
                    } else {
                        0
                    }
                })
                .sum();

            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((rule, score));
            }
        }

        match best {
            Some((rule, score)) => {
                let max_possible = (rule.keywords.len() * 2) as f64;
                TextClassification {
                    category: rule.category,
                    confidence: (score as f64 / max_possible).min(1.0),
                    method: TextMethod::Keyword,
                }
            }
            None => TextClassification::other(TextMethod::Keyword),
        }
    }

    fn classify_delegated(
        &self,
        delegate: &dyn TextCompletion,
        text: &str,
    ) -> Option<TextClassification> {
        let prompt = build_prompt(text);
        match delegate.complete(&prompt) {
            Ok(reply) => match TextCategory::from_label(&reply) {
                Some(category) => Some(TextClassification {
                    category,
                    confidence: DELEGATED_CONFIDENCE,
                    method: TextMethod::Delegated,
                }),
                None => {
                    warn!("Unrecognized category from completion: {:?}", reply);
                    None
                }
            },
            Err(e) => {
                warn!("Completion failed: {}", e);
                None
            }
        }
    }
}

fn build_prompt(text: &str) -> CompletionPrompt {
    let truncated: String = text.chars().take(DELEGATED_MAX_CHARS).collect();
    let labels: Vec<&str> = TextCategory::ALL.iter().map(|c| c.as_str()).collect();
    CompletionPrompt {
        system: "You label Arduino-related text. Reply with the category name only.".to_string(),
        user: format!(
            "Classify the following text into exactly one of these categories: {}.\n\nText: \"{}\"",
            labels.join(", "),
            truncated
        ),
        max_tokens: 10,
    }
}

/// One labelled entry of `classified_text.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedText {
    pub id: usize,
    pub original: Value,
    pub text_preview: String,
    pub category: TextCategory,
    pub confidence: f64,
    pub source: String,
    pub classification_method: TextMethod,
}

impl ClassifiedText {
    pub fn title(&self) -> Option<&str> {
        self.original.get("title").and_then(Value::as_str)
    }

    pub fn link(&self) -> Option<&str> {
        self.original.get("link").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct TextBatch {
    pub items: Vec<ClassifiedText>,
    pub placeholder: bool,
}

/// Picks the text to classify: snippet, then title, then description.
pub fn extract_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["snippet", "title", "description"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn placeholder_search_results() -> Vec<Value> {
    vec![
        json!({"title": "Arduino Uno Guide", "snippet": "Pinout diagram and pin functions for Arduino Uno"}),
        json!({"title": "LED Blink Code", "snippet": "How to program Arduino to make LED blink using digitalWrite"}),
    ]
}

pub fn classify_items(categorizer: &TextCategorizer, items: &[Value], source: &str) -> Vec<ClassifiedText> {
    let pb = ProgressBar::new(items.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} texts") {
        pb.set_style(style);
    }

    let classified = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let text = extract_text(item);
            let result = categorizer.classify(&text);
            pb.inc(1);
            ClassifiedText {
                id: idx + 1,
                original: item.clone(),
                text_preview: preview(&text),
                category: result.category,
                confidence: round2(result.confidence),
                source: source.to_string(),
                classification_method: result.method,
            }
        })
        .collect();

    pb.finish_and_clear();
    classified
}

/// Loads search results from `input` and labels every item.
pub fn classify_file(
    categorizer: &TextCategorizer,
    input: &Path,
    source: &str,
    mode: Mode,
) -> Result<TextBatch> {
    let (items, placeholder) = match load_json_array(input) {
        Ok(items) => (items, false),
        Err(PipelineError::MissingSource(_)) if !mode.is_strict() => {
            warn!("Input {:?} not found, classifying placeholder data", input);
            (placeholder_search_results(), true)
        }
        Err(e) => return Err(e),
    };

    info!("Classifying {} text items", items.len());
    let items = classify_items(categorizer, &items, source);
    Ok(TextBatch { items, placeholder })
}

pub fn log_distribution(items: &[ClassifiedText]) {
    if items.is_empty() {
        return;
    }
    let mut counts: Vec<(TextCategory, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(c, _)| *c == item.category) {
            Some((_, n)) => *n += 1,
            None => counts.push((item.category, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    for (category, count) in counts {
        let pct = count as f64 / items.len() as f64 * 100.0;
        info!("  {}: {} ({:.1}%)", category, count, pct);
    }
    info!("  total: {}", items.len());
}
