//! Marketing pipeline handlers.
//!
//! One handler per stage. Brief, script and storyboard answer with the stage
//! artifact inline; the animatic answers 202 immediately and is polled via
//! its status endpoint.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use adloom_models::{GenerationError, JobId, StoryboardItem, UsageMetadata};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{
    optional_text, require_text, validate_aspect_ratio, validate_duration_secs,
    MAX_DOCUMENT_LENGTH, MAX_PROMPT_LENGTH,
};

fn usage_fields(usage: Option<UsageMetadata>) -> (u32, u32, u64) {
    match usage {
        Some(u) => (u.input_tokens, u.output_tokens, u.latency_ms),
        None => (0, 0, 0),
    }
}

// ============================================================================
// Brief
// ============================================================================

/// Request to generate a marketing brief.
#[derive(Debug, Deserialize)]
pub struct BriefRequest {
    /// Product or campaign description
    pub prompt: String,
    /// Attach to an existing job instead of opening a new one
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Serialize)]
pub struct BriefResponse {
    pub job_id: JobId,
    pub markdown: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

/// Generate a marketing brief from a product prompt.
pub async fn create_brief(
    State(state): State<AppState>,
    Json(request): Json<BriefRequest>,
) -> ApiResult<Json<BriefResponse>> {
    let prompt = require_text("prompt", &request.prompt, MAX_PROMPT_LENGTH)
        .map_err(ApiError::bad_request)?;

    let (job_id, artifact) = state
        .orchestrator
        .create_brief(request.job_id, &prompt)
        .await?;

    let (input_tokens, output_tokens, latency_ms) = usage_fields(artifact.usage);
    Ok(Json(BriefResponse {
        job_id,
        markdown: artifact.markdown,
        input_tokens,
        output_tokens,
        latency_ms,
    }))
}

// ============================================================================
// Script
// ============================================================================

/// Request to generate a 30-second spot script.
#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    /// Optional writing instructions
    #[serde(default)]
    pub prompt: Option<String>,
    /// Brief to write against; falls back to the job's stored brief
    #[serde(default)]
    pub brief_markdown: Option<String>,
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Serialize)]
pub struct ScriptResponse {
    pub job_id: JobId,
    pub screenplay: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

/// Generate a script, against an explicit or previously stored brief.
pub async fn create_script(
    State(state): State<AppState>,
    Json(request): Json<ScriptRequest>,
) -> ApiResult<Json<ScriptResponse>> {
    let prompt = optional_text("prompt", request.prompt.as_deref(), MAX_PROMPT_LENGTH)
        .map_err(ApiError::bad_request)?;
    let brief = optional_text(
        "brief_markdown",
        request.brief_markdown.as_deref(),
        MAX_DOCUMENT_LENGTH,
    )
    .map_err(ApiError::bad_request)?;

    let (job_id, artifact) = state
        .orchestrator
        .create_script(request.job_id, prompt.as_deref(), brief.as_deref())
        .await?;

    let (input_tokens, output_tokens, latency_ms) = usage_fields(artifact.usage);
    Ok(Json(ScriptResponse {
        job_id,
        screenplay: artifact.screenplay,
        input_tokens,
        output_tokens,
        latency_ms,
    }))
}

// ============================================================================
// Storyboard
// ============================================================================

/// Request to render a storyboard.
#[derive(Debug, Deserialize)]
pub struct StoryboardRequest {
    /// Script to storyboard; falls back to the job's stored script
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// Image aspect ratio, e.g. "1:1" or "16:9"
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

#[derive(Serialize)]
pub struct StoryboardResponse {
    pub job_id: JobId,
    pub items: Vec<StoryboardItem>,
    pub latency_ms: u64,
}

/// Split the script into scenes and render one image per scene.
pub async fn create_storyboard(
    State(state): State<AppState>,
    Json(request): Json<StoryboardRequest>,
) -> ApiResult<Json<StoryboardResponse>> {
    let script = optional_text("script", request.script.as_deref(), MAX_DOCUMENT_LENGTH)
        .map_err(ApiError::bad_request)?;
    if let Some(aspect) = request.aspect_ratio.as_deref() {
        validate_aspect_ratio(aspect).map_err(ApiError::bad_request)?;
    }

    let (job_id, artifact) = state
        .orchestrator
        .create_storyboard(
            request.job_id,
            script.as_deref(),
            request.aspect_ratio.as_deref(),
        )
        .await?;

    info!(
        job_id = %job_id,
        scenes = artifact.items.len(),
        succeeded = artifact.succeeded_count(),
        "storyboard request served"
    );

    Ok(Json(StoryboardResponse {
        job_id,
        items: artifact.items,
        latency_ms: artifact.latency_ms,
    }))
}

// ============================================================================
// Animatic
// ============================================================================

/// Request to start an animatic render.
#[derive(Debug, Deserialize)]
pub struct AnimaticRequest {
    /// Script to animate; falls back to the job's stored script
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

#[derive(Serialize)]
pub struct AnimaticStartResponse {
    pub job_id: JobId,
}

/// Start an async animatic render. Returns 202 with the job id for polling.
pub async fn start_animatic(
    State(state): State<AppState>,
    Json(request): Json<AnimaticRequest>,
) -> ApiResult<(StatusCode, Json<AnimaticStartResponse>)> {
    let script = optional_text("script", request.script.as_deref(), MAX_DOCUMENT_LENGTH)
        .map_err(ApiError::bad_request)?;
    if let Some(duration) = request.duration_seconds {
        validate_duration_secs(duration).map_err(ApiError::bad_request)?;
    }

    let job_id = state
        .orchestrator
        .start_animatic(request.job_id, script.as_deref(), request.duration_seconds)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AnimaticStartResponse { job_id }),
    ))
}

#[derive(Serialize)]
pub struct AnimaticStatusResponse {
    pub job_id: JobId,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,
}

/// Get the status of an animatic render.
pub async fn animatic_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<AnimaticStatusResponse>> {
    let job_id = JobId::from_string(job_id);
    let animatic = state.orchestrator.animatic_status(&job_id).await?;

    Ok(Json(AnimaticStatusResponse {
        job_id,
        status: animatic.phase.as_str().to_string(),
        location: animatic.location,
        error: animatic.error,
    }))
}
