//! Image generation backend (`:predict`).

use adloom_models::{GenerationKind, GenerationPayload, GenerationRequest, GenerationResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{classify_error_response, parse_json, GenerationBackend, Submission};
use crate::config::GenAiConfig;
use crate::error::{GenAiError, GenAiResult};

const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Client for the synchronous image endpoint.
pub struct ImageBackend {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl ImageBackend {
    pub fn new(http: reqwest::Client, config: &GenAiConfig) -> Self {
        Self {
            http,
            url: format!("{}/models/{}:predict", config.api_base, config.image_model),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Instance>,
    parameters: ImageParameters,
}

#[derive(Serialize)]
struct Instance {
    prompt: String,
}

#[derive(Serialize)]
struct ImageParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "outputMimeType")]
    output_mime_type: String,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

#[async_trait]
impl GenerationBackend for ImageBackend {
    fn kind(&self) -> GenerationKind {
        GenerationKind::Image
    }

    async fn submit(&self, request: &GenerationRequest) -> GenAiResult<Submission> {
        let aspect_ratio = request
            .parameter("aspectRatio")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_ASPECT_RATIO)
            .to_string();

        let body = PredictRequest {
            instances: vec![Instance {
                prompt: request.prompt.clone(),
            }],
            parameters: ImageParameters {
                sample_count: 1,
                aspect_ratio,
                output_mime_type: "image/png".to_string(),
            },
        };

        let response = self
            .http
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_error_response("image_generate", response).await);
        }

        let raw = response.text().await?;
        let parsed: PredictResponse = parse_json("image_generate", &raw)?;

        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| GenAiError::malformed("no predictions in response", &raw))?;
        let encoded = prediction
            .bytes_base64_encoded
            .ok_or_else(|| GenAiError::malformed("prediction missing image bytes", &raw))?;
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| GenAiError::malformed(format!("image payload is not valid base64: {e}"), &raw))?;

        let content_type = prediction
            .mime_type
            .unwrap_or_else(|| "image/png".to_string());

        Ok(Submission::Completed(GenerationResult::succeeded(
            GenerationPayload::inline(bytes, content_type),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let body = PredictRequest {
            instances: vec![Instance {
                prompt: "a red bicycle".to_string(),
            }],
            parameters: ImageParameters {
                sample_count: 1,
                aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
                output_mime_type: "image/png".to_string(),
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["instances"][0]["prompt"], "a red bicycle");
        assert_eq!(value["parameters"]["sampleCount"], 1);
        assert_eq!(value["parameters"]["aspectRatio"], "1:1");
    }

    #[test]
    fn test_response_parses_base64_field() {
        let raw = r#"{"predictions":[{"bytesBase64Encoded":"aGk=","mimeType":"image/png"}]}"#;
        let parsed: PredictResponse = parse_json("image_generate", raw).unwrap();
        let bytes = BASE64
            .decode(parsed.predictions[0].bytes_base64_encoded.as_ref().unwrap())
            .unwrap();
        assert_eq!(bytes, b"hi");
    }
}
