//! Generation service configuration.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Configuration for the remote generation backends.
///
/// Built explicitly and passed down; nothing here lives in a global.
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    /// Base URL of the generation API. Tests point this at a local mock.
    pub api_base: String,

    /// API key sent with every request.
    pub api_key: String,

    /// Model id for text generation.
    pub text_model: String,

    /// Model id for image generation.
    pub image_model: String,

    /// Model id for video generation (long-running).
    pub video_model: String,

    /// Wall-clock budget for a single attempt of any leg.
    pub attempt_timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "imagen-4.0-generate-001".to_string(),
            video_model: "veo-3.0-generate-preview".to_string(),
            attempt_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

impl GenAiConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let attempt_timeout_secs: u64 = std::env::var("GENAI_ATTEMPT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120);

        let max_attempts: u32 = std::env::var("GENAI_RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        let base_delay_ms: u64 = std::env::var("GENAI_RETRY_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let max_delay_ms: u64 = std::env::var("GENAI_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);

        Self {
            api_base: std::env::var("GENAI_API_BASE")
                .unwrap_or(defaults.api_base)
                .trim_end_matches('/')
                .to_string(),
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            text_model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.text_model),
            image_model: std::env::var("IMAGEN_MODEL").unwrap_or(defaults.image_model),
            video_model: std::env::var("VEO_MODEL").unwrap_or(defaults.video_model),
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
            retry: RetryPolicy::new(
                max_attempts,
                Duration::from_millis(base_delay_ms),
                Duration::from_millis(max_delay_ms),
            ),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("GEMINI_API_KEY is not set".to_string());
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(format!("GENAI_API_BASE is not a URL: {}", self.api_base));
        }
        if self.attempt_timeout.is_zero() {
            return Err("GENAI_ATTEMPT_TIMEOUT_SECS must be positive".to_string());
        }
        Ok(())
    }
}
