//! Application state.

use std::sync::Arc;

use adloom_genai::{GenAiConfig, GenerationClient, ImageBackend, TextBackend, VideoBackend};
use adloom_pipeline::{MemoryJobStore, PipelineConfig, PipelineOrchestrator};
use adloom_storage::{ObjectStore, StorageConfig};
use anyhow::Context;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub jobs: Arc<MemoryJobStore>,
    pub objects: ObjectStore,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let genai = GenAiConfig::from_env();
        genai
            .validate()
            .map_err(|e| anyhow::anyhow!("generation config: {e}"))?;

        let pipeline = PipelineConfig::from_env();
        pipeline
            .validate()
            .map_err(|e| anyhow::anyhow!("pipeline config: {e}"))?;

        let storage = StorageConfig::from_env().context("storage config")?;
        let objects = ObjectStore::new(storage)
            .await
            .context("object store client")?;

        // One connection pool shared by all three backends
        let http = reqwest::Client::new();

        let text = GenerationClient::new(
            Arc::new(TextBackend::new(http.clone(), &genai)),
            genai.retry.clone(),
            genai.attempt_timeout,
        );
        let image = GenerationClient::new(
            Arc::new(ImageBackend::new(http.clone(), &genai)),
            genai.retry.clone(),
            genai.attempt_timeout,
        );
        let video = GenerationClient::new(
            Arc::new(VideoBackend::new(http, &genai)),
            genai.retry.clone(),
            genai.attempt_timeout,
        );

        let jobs = Arc::new(MemoryJobStore::new().with_retention(pipeline.job_retention));
        let orchestrator = PipelineOrchestrator::new(
            text,
            image,
            video,
            jobs.clone(),
            objects.clone(),
            pipeline,
        );

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            jobs,
            objects,
        })
    }
}
