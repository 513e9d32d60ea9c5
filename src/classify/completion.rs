use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::config::Settings;

/// A single prompt submitted to a text-completion backend.
#[derive(Debug, Clone)]
pub struct CompletionPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned error: status={status} body={body}")]
    Upstream { status: StatusCode, body: String },

    #[error("response contained no completion")]
    EmptyResponse,

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

impl CompletionError {
    fn is_transient(&self) -> bool {
        match self {
            CompletionError::Request(e) => e.is_timeout() || e.is_connect(),
            CompletionError::Upstream { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Anything that can turn a prompt into a short completion.
pub trait TextCompletion {
    fn complete(&self, prompt: &CompletionPrompt) -> Result<String, CompletionError>;
}

/// Bounded attempts with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.retry_max_attempts.max(1),
            initial_backoff: settings.retry_initial_backoff,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mult = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        std::cmp::min(self.initial_backoff.saturating_mul(mult), self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, CompletionError>,
    ) -> Result<T, CompletionError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && e.is_transient() => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "completion request failed, retrying"
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completions over blocking HTTP.
pub struct OpenAiCompletion {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiCompletion {
    pub fn from_settings(settings: &Settings) -> Result<Self, CompletionError> {
        let api_key = settings
            .openai_api_key
            .clone()
            .ok_or(CompletionError::MissingCredential("OPENAI_API_KEY"))?;
        let http = Client::builder()
            .user_agent("guide-pipeline")
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.openai_base_url.clone(),
            model: settings.openai_model.clone(),
            api_key,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    fn send(&self, prompt: &CompletionPrompt) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.0,
            max_tokens: prompt.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CompletionError::Upstream { status, body });
        }

        let parsed: ChatResponse = resp.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

impl TextCompletion for OpenAiCompletion {
    fn complete(&self, prompt: &CompletionPrompt) -> Result<String, CompletionError> {
        self.retry.run(|| self.send(prompt))
    }
}
