use std::fmt;
use std::time::Duration;

use insight_core::SampleError;

use crate::provider::LlmError;

/// Which top-level JSON value a request expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    pub fn delimiters(self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }
}

impl fmt::Display for JsonShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonShape::Object => f.write_str("object"),
            JsonShape::Array => f.write_str("array"),
        }
    }
}

/// Failure of one pass through the model pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("model error: {0}")]
    Model(#[from] LlmError),
    #[error("no JSON {shape} found in model response")]
    Extraction { shape: JsonShape },
    #[error("model response is not valid JSON after repair: {reason}")]
    Parse {
        reason: String,
        raw_response: String,
    },
    #[error("model response failed validation: {0}")]
    Validation(String),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error("prompt template error: {0}")]
    Prompt(String),
}

impl AnalysisError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Model(LlmError::NotConfigured(_)) => false,
            AnalysisError::Model(_)
            | AnalysisError::Extraction { .. }
            | AnalysisError::Parse { .. } => true,
            AnalysisError::Validation(_) | AnalysisError::Sample(_) | AnalysisError::Prompt(_) => {
                false
            }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AnalysisError::Model(LlmError::RateLimited { .. }))
    }

    /// Provider-suggested wait, when this is a rate limit that named one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AnalysisError::Model(LlmError::RateLimited { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        let rate = AnalysisError::Model(LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
            message: "Rate limit".into(),
        });
        assert!(rate.is_retryable());
        assert!(rate.is_rate_limited());
        assert_eq!(rate.retry_after(), Some(Duration::from_secs(3)));

        let parse = AnalysisError::Parse { reason: "eof".into(), raw_response: "{".into() };
        assert!(parse.is_retryable());
        assert!(parse.retry_after().is_none());

        assert!(!AnalysisError::Validation("no charts".into()).is_retryable());
        assert!(!AnalysisError::Model(LlmError::NotConfigured("key".into())).is_retryable());
        assert!(!AnalysisError::Sample(SampleError::Empty).is_retryable());
    }

    #[test]
    fn extraction_message_names_shape() {
        let err = AnalysisError::Extraction { shape: JsonShape::Array };
        assert_eq!(err.to_string(), "no JSON array found in model response");
    }
}
