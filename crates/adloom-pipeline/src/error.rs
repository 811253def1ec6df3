//! Error types for pipeline orchestration.

use adloom_genai::GenAiError;
use adloom_models::ErrorKind;
use adloom_storage::StorageError;
use thiserror::Error;

/// Errors raised by pipeline stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage was invoked without the upstream artifact it needs.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Caller-supplied input is structurally invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced job or stage result does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote generation call failed after the client gave up.
    #[error("Generation error: {0}")]
    GenAi(#[from] GenAiError),

    /// Artifact store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PipelineError {
    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Classification used for status mapping and retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingInput(_)
            | PipelineError::InvalidInput(_)
            | PipelineError::NotFound(_) => ErrorKind::Permanent,
            PipelineError::GenAi(e) => e.kind(),
            PipelineError::Storage(_) => ErrorKind::Transient,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PipelineError::missing_input("no script").kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            PipelineError::not_found("job gone").kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            PipelineError::from(GenAiError::transient("reset")).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            PipelineError::from(StorageError::operation_failed("bucket down")).kind(),
            ErrorKind::Transient
        );
    }
}
