//! Generation request/result types.
//!
//! A [`GenerationRequest`] describes one call against a remote generative
//! service; a [`GenerationResult`] is its terminal outcome. Results carry the
//! artifact either inline or as a location reference into an external store.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of asset a generation request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Text,
    Image,
    Video,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Text => "text",
            GenerationKind::Image => "image",
            GenerationKind::Video => "video",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One request against a remote generation service.
///
/// Immutable once submitted: retries resend the identical request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRequest {
    pub kind: GenerationKind,

    /// The prompt text sent to the service.
    pub prompt: String,

    /// Service-specific options (aspect ratio, duration, sampling knobs).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self::new(GenerationKind::Text, prompt)
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self::new(GenerationKind::Image, prompt)
    }

    pub fn video(prompt: impl Into<String>) -> Self {
        Self::new(GenerationKind::Video, prompt)
    }

    /// Attach a service-specific option.
    pub fn with_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }
}

/// Terminal status of a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Succeeded,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Succeeded => "succeeded",
            GenerationStatus::Failed => "failed",
        }
    }
}

/// Where a finished artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPayload {
    /// Raw bytes returned inline by the service.
    Inline { bytes: Vec<u8>, content_type: String },
    /// Reference into an external object store.
    Location { uri: String },
}

impl GenerationPayload {
    pub fn inline(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self::Inline {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn location(uri: impl Into<String>) -> Self {
        Self::Location { uri: uri.into() }
    }

    /// Inline UTF-8 text payload.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::Inline {
            bytes: text.into().into_bytes(),
            content_type: "text/plain; charset=utf-8".to_string(),
        }
    }
}

/// Classification of a generation failure.
///
/// Drives both the retry decision in the client and the HTTP status the API
/// reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Worth retrying: connection resets, 5xx, rate limits, timeouts.
    Transient,
    /// Never retried: the request itself is wrong.
    Permanent,
    /// The remote answered with a shape that does not match the contract.
    Malformed,
    /// A deadline elapsed before the remote finished.
    TimedOut,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Malformed => "malformed",
            ErrorKind::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error attached to a failed generation or storyboard item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Token and latency accounting reported by text services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UsageMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

/// Outcome of one generation call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationResult {
    pub status: GenerationStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<GenerationPayload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
}

impl GenerationResult {
    pub fn succeeded(payload: GenerationPayload) -> Self {
        Self {
            status: GenerationStatus::Succeeded,
            payload: Some(payload),
            error: None,
            usage: None,
        }
    }

    pub fn succeeded_with_usage(payload: GenerationPayload, usage: UsageMetadata) -> Self {
        Self {
            usage: Some(usage),
            ..Self::succeeded(payload)
        }
    }

    pub fn failed(error: GenerationError) -> Self {
        Self {
            status: GenerationStatus::Failed,
            payload: None,
            error: Some(error),
            usage: None,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == GenerationStatus::Succeeded
    }

    /// Text content, when the payload is inline UTF-8.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Some(GenerationPayload::Inline { bytes, .. }) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Consume the result, yielding inline text if present.
    pub fn into_text(self) -> Option<String> {
        match self.payload {
            Some(GenerationPayload::Inline { bytes, .. }) => String::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Location reference, when the artifact lives in an external store.
    pub fn location(&self) -> Option<&str> {
        match &self.payload {
            Some(GenerationPayload::Location { uri }) => Some(uri),
            _ => None,
        }
    }

    /// Inline bytes, when the service returned the artifact directly.
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Some(GenerationPayload::Inline { bytes, .. }) => Some(bytes),
            _ => None,
        }
    }
}
