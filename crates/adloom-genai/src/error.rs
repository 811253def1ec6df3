//! Error types for remote generation calls.
//!
//! Every failure from a generation service is normalized into one of these
//! variants; the variant alone decides whether the retry loop runs again.

use std::time::Duration;

use adloom_models::{ErrorKind, GenerationError};
use thiserror::Error;

/// Characters of the raw response body kept on malformed errors.
const RAW_SNIPPET_LEN: usize = 512;

pub type GenAiResult<T> = Result<T, GenAiError>;

/// Errors from remote generation services.
#[derive(Debug, Error)]
pub enum GenAiError {
    /// Transport or service failure that is safe to retry.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The service asked us to slow down (HTTP 429).
    #[error("rate limited by service")]
    RateLimited { retry_after_ms: Option<u64> },

    /// The request was rejected; retrying the same request cannot help.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The response shape does not match the protocol contract.
    #[error("malformed response: {message}")]
    Malformed { message: String, raw: String },

    /// A deadline elapsed before the remote finished.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller cancelled the operation.
    #[error("cancelled by caller")]
    Cancelled,
}

impl GenAiError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Build a malformed-response error, keeping a bounded snippet of the raw
    /// body for diagnosis.
    pub fn malformed(message: impl Into<String>, raw: &str) -> Self {
        Self::Malformed {
            message: message.into(),
            raw: raw.chars().take(RAW_SNIPPET_LEN).collect(),
        }
    }

    /// Whether the retry loop should run this call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, GenAiError::Transient(_) | GenAiError::RateLimited { .. })
    }

    /// Backoff floor requested by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenAiError::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// Classification used for HTTP mapping and storyboard items.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenAiError::Transient(_) | GenAiError::RateLimited { .. } => ErrorKind::Transient,
            GenAiError::Permanent(_) | GenAiError::Cancelled => ErrorKind::Permanent,
            GenAiError::Malformed { .. } => ErrorKind::Malformed,
            GenAiError::TimedOut(_) => ErrorKind::TimedOut,
        }
    }

    /// Convert into the serializable error carried on results and items.
    pub fn to_generation_error(&self) -> GenerationError {
        GenerationError::new(self.kind(), self.to_string())
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed {
                message: err.to_string(),
                raw: String::new(),
            }
        } else {
            // Connect failures, resets, client-side timeouts.
            Self::Transient(err.to_string())
        }
    }
}
