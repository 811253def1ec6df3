//! Video generation backend (`:predictLongRunning` plus operation polling).
//!
//! Submit starts a long-running operation and yields its handle; each poll is
//! a GET on the operation name. A completed operation either carries a video
//! location/bytes or a structured error.

use adloom_models::{
    ErrorKind, GenerationError, GenerationKind, GenerationPayload, GenerationRequest,
    GenerationResult,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{
    classify_error_response, parse_json, GenerationBackend, OperationHandle, RemoteProbe,
    Submission,
};
use crate::config::GenAiConfig;
use crate::error::{GenAiError, GenAiResult};

const DEFAULT_ASPECT_RATIO: &str = "16:9";
const DEFAULT_NEGATIVE_PROMPT: &str = "cartoon, drawing, low quality, text, watermark";

/// Client for the long-running video endpoint.
pub struct VideoBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl VideoBackend {
    pub fn new(http: reqwest::Client, config: &GenAiConfig) -> Self {
        Self {
            http,
            base_url: config.api_base.clone(),
            model: config.video_model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Serialize)]
struct PredictLongRunningRequest {
    instances: Vec<Instance>,
    parameters: VideoParameters,
}

#[derive(Serialize)]
struct Instance {
    prompt: String,
}

#[derive(Serialize)]
struct VideoParameters {
    #[serde(rename = "durationSeconds", skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<u32>,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "negativePrompt")]
    negative_prompt: String,
    #[serde(rename = "generateAudio")]
    generate_audio: bool,
}

#[derive(Deserialize)]
struct StartResponse {
    name: Option<String>,
}

#[derive(Deserialize)]
struct OperationStatus {
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Deserialize)]
struct OperationError {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct OperationResponse {
    #[serde(rename = "generateVideoResponse")]
    generate_video_response: Option<VideoResponse>,
}

#[derive(Deserialize)]
struct VideoResponse {
    #[serde(rename = "generatedSamples", default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
    video: Option<VideoHandle>,
}

#[derive(Deserialize)]
struct VideoHandle {
    uri: Option<String>,
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
}

#[async_trait]
impl GenerationBackend for VideoBackend {
    fn kind(&self) -> GenerationKind {
        GenerationKind::Video
    }

    async fn submit(&self, request: &GenerationRequest) -> GenAiResult<Submission> {
        let parameters = VideoParameters {
            duration_seconds: request
                .parameter("durationSeconds")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
            aspect_ratio: request
                .parameter("aspectRatio")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_ASPECT_RATIO)
                .to_string(),
            negative_prompt: request
                .parameter("negativePrompt")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_NEGATIVE_PROMPT)
                .to_string(),
            generate_audio: true,
        };

        let body = PredictLongRunningRequest {
            instances: vec![Instance {
                prompt: request.prompt.clone(),
            }],
            parameters,
        };

        let url = format!(
            "{}/models/{}:predictLongRunning",
            self.base_url, self.model
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_error_response("video_submit", response).await);
        }

        let raw = response.text().await?;
        let parsed: StartResponse = parse_json("video_submit", &raw)?;
        let name = parsed
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| GenAiError::malformed("operation name missing from response", &raw))?;

        Ok(Submission::Operation(OperationHandle(name)))
    }

    async fn poll(&self, handle: &OperationHandle) -> GenAiResult<RemoteProbe> {
        let url = format!("{}/{}", self.base_url, handle.as_str());
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_error_response("video_poll", response).await);
        }

        let raw = response.text().await?;
        let parsed: OperationStatus = parse_json("video_poll", &raw)?;

        if !parsed.done {
            return Ok(RemoteProbe::Pending);
        }

        if let Some(err) = parsed.error {
            let message = format!(
                "video generation failed (code {}): {}",
                err.code.unwrap_or_default(),
                err.message.unwrap_or_else(|| "unknown error".to_string())
            );
            return Ok(RemoteProbe::Done(GenerationResult::failed(
                GenerationError::new(ErrorKind::Permanent, message),
            )));
        }

        let video = parsed
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|v| v.generated_samples.into_iter().next())
            .and_then(|s| s.video);

        match video {
            Some(VideoHandle { uri: Some(uri), .. }) => Ok(RemoteProbe::Done(
                GenerationResult::succeeded(GenerationPayload::location(uri)),
            )),
            Some(VideoHandle {
                bytes_base64_encoded: Some(encoded),
                ..
            }) => {
                let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                    GenAiError::malformed(format!("video payload is not valid base64: {e}"), &raw)
                })?;
                Ok(RemoteProbe::Done(GenerationResult::succeeded(
                    GenerationPayload::inline(bytes, "video/mp4"),
                )))
            }
            _ => Err(GenAiError::malformed(
                "operation completed without a video payload",
                &raw,
            )),
        }
    }
}
