//! Text generation backend (`:generateContent`).

use std::time::Instant;

use adloom_models::{
    GenerationKind, GenerationPayload, GenerationRequest, GenerationResult, UsageMetadata,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    classify_error_response, parse_json, strip_code_fences, GenerationBackend, Submission,
};
use crate::config::GenAiConfig;
use crate::error::{GenAiError, GenAiResult};

/// Default sampling knobs, overridable per request.
const DEFAULT_TEMPERATURE: f64 = 0.4;
const DEFAULT_TOP_P: f64 = 0.9;
const DEFAULT_TOP_K: u32 = 40;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Client for the synchronous text endpoint.
pub struct TextBackend {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl TextBackend {
    pub fn new(http: reqwest::Client, config: &GenAiConfig) -> Self {
        Self {
            http,
            url: format!(
                "{}/models/{}:generateContent",
                config.api_base, config.text_model
            ),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: SamplingConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct SamplingConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

impl SamplingConfig {
    fn from_request(request: &GenerationRequest) -> Self {
        let float = |key: &str, default: f64| {
            request
                .parameter(key)
                .and_then(|v| v.as_f64())
                .unwrap_or(default)
        };
        let int = |key: &str, default: u32| {
            request
                .parameter(key)
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .unwrap_or(default)
        };

        Self {
            temperature: float("temperature", DEFAULT_TEMPERATURE),
            top_p: float("topP", DEFAULT_TOP_P),
            top_k: int("topK", DEFAULT_TOP_K),
            max_output_tokens: int("maxOutputTokens", DEFAULT_MAX_OUTPUT_TOKENS),
            response_mime_type: request
                .parameter("responseMimeType")
                .and_then(|v| v.as_str())
                .map(String::from),
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageCounts>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Default)]
struct UsageCounts {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}

#[async_trait]
impl GenerationBackend for TextBackend {
    fn kind(&self) -> GenerationKind {
        GenerationKind::Text
    }

    async fn submit(&self, request: &GenerationRequest) -> GenAiResult<Submission> {
        let started = Instant::now();
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: SamplingConfig::from_request(request),
        };

        let response = self
            .http
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_error_response("text_generate", response).await);
        }

        let raw = response.text().await?;
        let parsed: GenerateContentResponse = parse_json("text_generate", &raw)?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenAiError::malformed("no candidate text in response", &raw));
        }

        let counts = parsed.usage_metadata.unwrap_or_default();
        let usage = UsageMetadata {
            input_tokens: counts.prompt_token_count,
            output_tokens: counts.candidates_token_count,
            latency_ms: started.elapsed().as_millis() as u64,
        };

        let text = strip_code_fences(&text).to_string();
        Ok(Submission::Completed(
            GenerationResult::succeeded_with_usage(GenerationPayload::from_text(text), usage),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_defaults() {
        let request = GenerationRequest::text("hello");
        let config = SamplingConfig::from_request(&request);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
        assert!(config.response_mime_type.is_none());
    }

    #[test]
    fn test_sampling_overrides() {
        let request = GenerationRequest::text("hello")
            .with_parameter("temperature", 0.9)
            .with_parameter("maxOutputTokens", 256)
            .with_parameter("responseMimeType", "application/json");
        let config = SamplingConfig::from_request(&request);
        assert_eq!(config.temperature, 0.9);
        assert_eq!(config.max_output_tokens, 256);
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = GenerationRequest::text("write a brief");
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: SamplingConfig::from_request(&request),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "write a brief");
        assert_eq!(value["generationConfig"]["topP"], DEFAULT_TOP_P);
    }
}
