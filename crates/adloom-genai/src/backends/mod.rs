//! HTTP backends for the remote generation API.
//!
//! Each backend speaks one endpoint family and performs exactly one leg per
//! call: a submit, or a poll of a previously returned operation. Retry,
//! timeouts, and scheduling live above this layer.

use adloom_models::{GenerationKind, GenerationRequest, GenerationResult};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{GenAiError, GenAiResult};

mod image;
mod text;
mod video;

pub use image::ImageBackend;
pub use text::TextBackend;
pub use video::VideoBackend;

/// Opaque token identifying a long-running remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a submit leg produced.
#[derive(Debug)]
pub enum Submission {
    /// The service answered with the finished artifact.
    Completed(GenerationResult),
    /// The service started a long-running operation.
    Operation(OperationHandle),
}

/// What a poll leg observed.
#[derive(Debug)]
pub enum RemoteProbe {
    /// The operation is still running.
    Pending,
    /// The operation finished; the result may itself report failure.
    Done(GenerationResult),
}

/// One remote generation service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Asset kind this backend produces.
    fn kind(&self) -> GenerationKind;

    /// Run one submit leg for `request`.
    async fn submit(&self, request: &GenerationRequest) -> GenAiResult<Submission>;

    /// Run one poll leg for a previously submitted operation.
    async fn poll(&self, handle: &OperationHandle) -> GenAiResult<RemoteProbe> {
        let _ = handle;
        Err(GenAiError::permanent(
            "backend does not expose long-running operations",
        ))
    }
}

/// Strip a surrounding markdown code fence, if present.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "markdown") up to the first newline.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Normalize a non-2xx response into the error taxonomy.
pub(crate) async fn classify_error_response(operation: &str, response: Response) -> GenAiError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        warn!(operation, retry_after_ms, "generation service rate limited");
        return GenAiError::RateLimited { retry_after_ms };
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();

    if status.is_server_error() {
        warn!(operation, %status, body = %snippet, "generation service error");
        GenAiError::transient(format!("{operation} returned {status}: {snippet}"))
    } else {
        warn!(operation, %status, body = %snippet, "generation request rejected");
        GenAiError::permanent(format!("{operation} returned {status}: {snippet}"))
    }
}

/// Parse a response body, mapping failure to a malformed-response error with
/// the raw body attached for diagnosis.
pub(crate) fn parse_json<T: DeserializeOwned>(operation: &str, body: &str) -> GenAiResult<T> {
    serde_json::from_str(body).map_err(|e| {
        warn!(operation, error = %e, body = %body.chars().take(200).collect::<String>(),
            "could not parse generation response");
        GenAiError::malformed(format!("{operation}: {e}"), body)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("plain text"), "plain text");
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\nbody\n```"), "body");
        assert_eq!(strip_code_fences("  ```markdown\n# Brief\n```  "), "# Brief");
    }

    #[test]
    fn test_parse_json_maps_to_malformed() {
        let result: GenAiResult<Vec<u32>> = parse_json("test_op", "not json");
        assert!(matches!(result, Err(GenAiError::Malformed { .. })));

        let result: GenAiResult<Vec<u32>> = parse_json("test_op", "[1,2,3]");
        assert_eq!(result.ok(), Some(vec![1, 2, 3]));
    }
}
