//! Error types for artifact store operations.

use thiserror::Error;

/// Errors raised by the artifact store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Store configuration is missing or invalid.
    #[error("Storage configuration error: {0}")]
    ConfigError(String),

    /// An upload did not complete.
    #[error("Upload failed for '{key}': {message}")]
    UploadFailed { key: String, message: String },

    /// Any other store operation failure.
    #[error("Storage operation failed: {0}")]
    OperationFailed(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UploadFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
