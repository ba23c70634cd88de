use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A chat message for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Trait for LLM providers. Each backend implements this.
///
/// One call is one network request: no retry, no caching.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's response text.
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },
    #[error("API error: {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

static RETRY_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)try again in\s+(?:(\d+)m)?(\d+(?:\.\d+)?)(ms|s)\b")
        .expect("retry hint pattern is valid")
});

/// Parse a provider's "try again in 7.66s" hint.
///
/// Accepts `450ms`, `11.1s` and `1m2.5s` forms.
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let caps = RETRY_HINT.captures(message)?;
    let minutes: f64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let amount: f64 = caps.get(2)?.as_str().parse().ok()?;
    let secs = match caps.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "ms" => amount / 1000.0,
        _ => amount,
    } + minutes * 60.0;
    Duration::try_from_secs_f64(secs).ok()
}

/// Turn a non-success provider response into a typed error.
///
/// HTTP 429, or any body mentioning a rate limit, becomes
/// [`LlmError::RateLimited`] with the suggested wait when one is given.
pub fn classify_api_error(status: u16, body: String) -> LlmError {
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.clone());

    if status == 429 || message.to_lowercase().contains("rate limit") {
        return LlmError::RateLimited {
            retry_after: parse_retry_after(&message),
            message,
        };
    }
    LlmError::ApiError { status, body }
}
