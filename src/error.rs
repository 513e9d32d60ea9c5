use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("no columns for {entity} (looked for tokens: {})", .tokens.join(", "))]
    MissingColumns { entity: String, tokens: Vec<String> },

    #[error("input file not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid keyword pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
