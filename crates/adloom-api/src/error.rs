//! API error types.

use adloom_models::ErrorKind;
use adloom_pipeline::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream returned an unusable response: {0}")]
    UpstreamMalformed(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UpstreamMalformed(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "permanent",
            ApiError::NotFound(_) => "not_found",
            ApiError::UpstreamMalformed(_) => "malformed",
            ApiError::UpstreamUnavailable(_) => "transient",
            ApiError::UpstreamTimeout(_) => "timed_out",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PipelineError::MissingInput(_) | PipelineError::InvalidInput(_) => {
                ApiError::BadRequest(err.to_string())
            }
            _ => match err.kind() {
                ErrorKind::Permanent => ApiError::BadRequest(err.to_string()),
                ErrorKind::Malformed => ApiError::UpstreamMalformed(err.to_string()),
                ErrorKind::Transient => ApiError::UpstreamUnavailable(err.to_string()),
                ErrorKind::TimedOut => ApiError::UpstreamTimeout(err.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) | ApiError::UpstreamMalformed(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            kind: self.kind(),
        };

        (status, Json(body)).into_response()
    }
}
