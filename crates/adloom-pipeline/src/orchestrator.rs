//! Pipeline orchestration across the four stages.
//!
//! Each stage is independently invokable under a shared job id. Brief,
//! script and storyboard run synchronously within the calling task; the
//! animatic submits a long-running video operation and hands it to a spawned
//! driver task, so starting one never blocks on the remote render. Stage
//! results are append-only: a failed invocation leaves earlier artifacts in
//! place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use adloom_genai::{
    GenAiError, GenerationClient, JobPoller, Operation, PollOutcome, PollSchedule, Submission,
};
use adloom_models::{
    AnimaticArtifact, BriefArtifact, ErrorKind, GenerationError, GenerationPayload,
    GenerationRequest, GenerationResult, JobId, PipelineJob, PipelineStage, Scene, ScriptArtifact,
    StoryboardArtifact, UsageMetadata,
};
use adloom_storage::{ContentAddresser, ObjectStore};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::fanout::{SceneFanout, DEFAULT_SCENE_CONCURRENCY};
use crate::metrics;
use crate::prompts;
use crate::scenes;
use crate::store::{JobStore, DEFAULT_RETENTION};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Max scenes rendered concurrently in a storyboard fanout.
    pub scene_concurrency: usize,

    /// Deadline for an image generation that goes long-running.
    pub image_deadline: Duration,

    /// Deadline for the animatic video operation.
    pub video_deadline: Duration,

    pub poll_schedule: PollSchedule,

    /// Default animatic length in seconds.
    pub animatic_duration_secs: u32,

    /// Aspect ratio for storyboard images.
    pub image_aspect_ratio: String,

    /// How long job records are kept after their last update.
    pub job_retention: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scene_concurrency: DEFAULT_SCENE_CONCURRENCY,
            image_deadline: Duration::from_secs(120),
            video_deadline: Duration::from_secs(300),
            poll_schedule: PollSchedule::default(),
            animatic_duration_secs: 45,
            image_aspect_ratio: "1:1".to_string(),
            job_retention: DEFAULT_RETENTION,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let scene_concurrency: usize = std::env::var("PIPELINE_SCENE_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.scene_concurrency);

        let image_deadline_secs: u64 = std::env::var("PIPELINE_IMAGE_DEADLINE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.image_deadline.as_secs());

        let video_deadline_secs: u64 = std::env::var("PIPELINE_VIDEO_DEADLINE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.video_deadline.as_secs());

        let poll_initial_secs: u64 = std::env::var("PIPELINE_POLL_INITIAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.poll_schedule.initial_interval.as_secs());

        let poll_max_secs: u64 = std::env::var("PIPELINE_POLL_MAX_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.poll_schedule.max_interval.as_secs());

        let animatic_duration_secs: u32 = std::env::var("ANIMATIC_DURATION_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.animatic_duration_secs);

        let image_aspect_ratio = std::env::var("IMAGE_ASPECT_RATIO")
            .unwrap_or(defaults.image_aspect_ratio);

        let retention_hours: u64 = std::env::var("JOB_RETENTION_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.job_retention.as_secs() / 3600);

        Self {
            scene_concurrency,
            image_deadline: Duration::from_secs(image_deadline_secs),
            video_deadline: Duration::from_secs(video_deadline_secs),
            poll_schedule: PollSchedule::new(
                Duration::from_secs(poll_initial_secs),
                Duration::from_secs(poll_max_secs),
            ),
            animatic_duration_secs,
            image_aspect_ratio,
            job_retention: Duration::from_secs(retention_hours * 3600),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.scene_concurrency == 0 {
            return Err("PIPELINE_SCENE_CONCURRENCY must be at least 1".to_string());
        }
        if self.image_deadline.is_zero() || self.video_deadline.is_zero() {
            return Err("generation deadlines must be non-zero".to_string());
        }
        if self.animatic_duration_secs == 0 {
            return Err("ANIMATIC_DURATION_SECS must be at least 1".to_string());
        }
        if !self.image_aspect_ratio.contains(':') {
            return Err(format!(
                "'{}' is not a valid aspect ratio",
                self.image_aspect_ratio
            ));
        }
        Ok(())
    }
}

/// Drives the brief, script, storyboard and animatic stages.
pub struct PipelineOrchestrator {
    text: GenerationClient,
    image: GenerationClient,
    video: GenerationClient,
    store: Arc<dyn JobStore>,
    objects: ObjectStore,
    config: PipelineConfig,
    cancellations: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl PipelineOrchestrator {
    pub fn new(
        text: GenerationClient,
        image: GenerationClient,
        video: GenerationClient,
        store: Arc<dyn JobStore>,
        objects: ObjectStore,
        config: PipelineConfig,
    ) -> Self {
        Self {
            text,
            image,
            video,
            store,
            objects,
            config,
            cancellations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate a marketing brief from a product prompt.
    pub async fn create_brief(
        &self,
        job: Option<JobId>,
        prompt: &str,
    ) -> PipelineResult<(JobId, BriefArtifact)> {
        let started = Instant::now();
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PipelineError::missing_input("prompt is required for a brief"));
        }

        let id = job.unwrap_or_default();
        self.store.get_or_create(&id).await?;
        info!(job_id = %id, "generating marketing brief");

        let (markdown, usage) = match self.invoke_text(prompts::brief_prompt(prompt)).await {
            Ok(generated) => generated,
            Err(e) => return Err(self.stage_failed(&id, PipelineStage::Brief, started, e).await),
        };

        let artifact = BriefArtifact::new(markdown, usage);
        self.store.record_brief(&id, artifact.clone()).await?;
        metrics::record_stage(
            PipelineStage::Brief.as_str(),
            "succeeded",
            started.elapsed().as_millis() as f64,
        );
        info!(job_id = %id, latency_ms = started.elapsed().as_millis() as u64, "brief ready");
        Ok((id, artifact))
    }

    /// Generate a 30-second spot script, optionally against a prior brief.
    pub async fn create_script(
        &self,
        job: Option<JobId>,
        prompt: Option<&str>,
        brief: Option<&str>,
    ) -> PipelineResult<(JobId, ScriptArtifact)> {
        let started = Instant::now();
        let id = job.unwrap_or_default();
        let record = self.store.get_or_create(&id).await?;

        let brief_context: Option<String> = brief
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .or_else(|| record.brief.map(|b| b.markdown));

        let has_prompt = prompt.map(str::trim).is_some_and(|p| !p.is_empty());
        if !has_prompt && brief_context.is_none() {
            return Err(PipelineError::missing_input(
                "script needs a prompt or a prior brief; generate a brief first",
            ));
        }

        info!(job_id = %id, with_brief = brief_context.is_some(), "generating script");
        let composed = prompts::script_prompt(prompt, brief_context.as_deref());
        let (screenplay, usage) = match self.invoke_text(composed).await {
            Ok(generated) => generated,
            Err(e) => return Err(self.stage_failed(&id, PipelineStage::Script, started, e).await),
        };

        let artifact = ScriptArtifact::new(screenplay, usage);
        self.store.record_script(&id, artifact.clone()).await?;
        metrics::record_stage(
            PipelineStage::Script.as_str(),
            "succeeded",
            started.elapsed().as_millis() as f64,
        );
        info!(job_id = %id, latency_ms = started.elapsed().as_millis() as u64, "script ready");
        Ok((id, artifact))
    }

    /// Split the script into scenes and render one image per scene.
    pub async fn create_storyboard(
        &self,
        job: Option<JobId>,
        script: Option<&str>,
        aspect_ratio: Option<&str>,
    ) -> PipelineResult<(JobId, StoryboardArtifact)> {
        let started = Instant::now();
        let id = job.unwrap_or_default();
        let record = self.store.get_or_create(&id).await?;

        let Some(script_text) = resolve_script(script, &record) else {
            return Err(PipelineError::missing_input(
                "storyboard needs a script; generate one first",
            ));
        };

        info!(job_id = %id, "splitting script into scenes");
        let (split_raw, _) = match self
            .invoke_text(prompts::scene_split_prompt(&script_text))
            .await
        {
            Ok(generated) => generated,
            Err(e) => {
                return Err(
                    self.stage_failed(&id, PipelineStage::Storyboard, started, e).await,
                )
            }
        };
        let scenes = scenes::split_scenes(&split_raw);
        info!(job_id = %id, scenes = scenes.len(), "rendering storyboard");

        let aspect = aspect_ratio
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.config.image_aspect_ratio)
            .to_string();

        let cancel = self.begin_cancellable(&id).await;
        let fanout = SceneFanout::new(self.config.scene_concurrency).with_cancellation(cancel);

        let worker = {
            let image = self.image.clone();
            let objects = self.objects.clone();
            let job_id = id.clone();
            let schedule = self.config.poll_schedule.clone();
            let deadline = self.config.image_deadline;
            move |scene: Scene| {
                let image = image.clone();
                let objects = objects.clone();
                let job_id = job_id.clone();
                let aspect = aspect.clone();
                let schedule = schedule.clone();
                async move {
                    render_scene(image, objects, job_id, aspect, schedule, deadline, scene).await
                }
            }
        };

        let fanout_started = Instant::now();
        let run = fanout.run(&scenes, worker).await;
        self.end_cancellable(&id).await;

        let items = match run {
            Ok(items) => items,
            Err(e) => {
                return Err(
                    self.stage_failed(&id, PipelineStage::Storyboard, started, e).await,
                )
            }
        };

        let artifact = StoryboardArtifact::new(items, fanout_started.elapsed().as_millis() as u64);
        self.store.record_storyboard(&id, artifact.clone()).await?;
        metrics::record_stage(
            PipelineStage::Storyboard.as_str(),
            "succeeded",
            started.elapsed().as_millis() as f64,
        );
        info!(
            job_id = %id,
            succeeded = artifact.succeeded_count(),
            total = artifact.items.len(),
            "storyboard ready"
        );
        Ok((id, artifact))
    }

    /// Synthesize a video prompt from the script, submit the video operation
    /// and return immediately; a spawned driver owns the poll loop.
    pub async fn start_animatic(
        &self,
        job: Option<JobId>,
        script: Option<&str>,
        duration_secs: Option<u32>,
    ) -> PipelineResult<JobId> {
        let started = Instant::now();
        let id = job.unwrap_or_default();
        let record = self.store.get_or_create(&id).await?;

        let Some(script_text) = resolve_script(script, &record) else {
            return Err(PipelineError::missing_input(
                "animatic needs a script; generate one first",
            ));
        };

        info!(job_id = %id, "synthesizing video prompt");
        let (video_prompt, _) = match self
            .invoke_text(prompts::video_synthesis_prompt(&script_text))
            .await
        {
            Ok(generated) => generated,
            Err(e) => return Err(self.stage_failed(&id, PipelineStage::Animatic, started, e).await),
        };

        let duration = duration_secs.unwrap_or(self.config.animatic_duration_secs);
        let request = GenerationRequest::video(video_prompt.clone())
            .with_parameter("durationSeconds", duration);

        let submission = match self.video.submit(&request).await {
            Ok(submission) => submission,
            Err(e) => {
                return Err(
                    self.stage_failed(&id, PipelineStage::Animatic, started, e.into()).await,
                )
            }
        };

        match submission {
            Submission::Completed(result) => {
                // the service answered synchronously; settle in place
                self.store.begin_animatic(&id, None).await?;
                finalize_animatic(
                    Arc::clone(&self.store),
                    self.objects.clone(),
                    id.clone(),
                    video_prompt,
                    PollOutcome::Succeeded(result),
                    started.elapsed().as_millis() as f64,
                )
                .await;
            }
            Submission::Operation(handle) => {
                self.store
                    .begin_animatic(&id, Some(handle.as_str().to_string()))
                    .await?;

                let cancel = self.begin_cancellable(&id).await;
                let poller = JobPoller::new(
                    self.video.clone(),
                    self.config.poll_schedule.clone(),
                    self.config.video_deadline,
                )
                .with_cancellation(cancel);

                let store = Arc::clone(&self.store);
                let objects = self.objects.clone();
                let cancellations = Arc::clone(&self.cancellations);
                let job_id = id.clone();
                let span = info_span!("animatic_driver", job_id = %id);

                tokio::spawn(
                    async move {
                        let waited = Instant::now();
                        let (operation, outcome) = poller.wait(Operation::new(handle)).await;
                        debug!(
                            polls = operation.poll_count,
                            phase = operation.phase.as_str(),
                            "animatic operation settled"
                        );
                        finalize_animatic(
                            store,
                            objects,
                            job_id.clone(),
                            video_prompt,
                            outcome,
                            waited.elapsed().as_millis() as f64,
                        )
                        .await;
                        cancellations.lock().await.remove(&job_id);
                    }
                    .instrument(span),
                );
            }
        }

        metrics::record_stage(
            PipelineStage::Animatic.as_str(),
            "submitted",
            started.elapsed().as_millis() as f64,
        );
        info!(job_id = %id, "animatic submitted");
        Ok(id)
    }

    /// Snapshot of the animatic stage for a job.
    pub async fn animatic_status(&self, id: &JobId) -> PipelineResult<AnimaticArtifact> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("job '{id}' not found")))?;

        job.animatic
            .ok_or_else(|| PipelineError::not_found(format!("no animatic started for job '{id}'")))
    }

    /// Cancel the in-flight work for a job. Completed stage results are
    /// preserved; returns whether anything was actually cancelled.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let mut cancellations = self.cancellations.lock().await;
        match cancellations.remove(id) {
            Some(token) => {
                info!(job_id = %id, "cancelling in-flight work");
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn invoke_text(
        &self,
        prompt: String,
    ) -> PipelineResult<(String, Option<UsageMetadata>)> {
        let request = GenerationRequest::text(prompt);
        let result = self.text.invoke(&request).await?;
        let usage = result.usage;
        match result.into_text() {
            Some(text) if !text.trim().is_empty() => Ok((text, usage)),
            _ => Err(GenAiError::malformed("text service response carried no text", "").into()),
        }
    }

    async fn stage_failed(
        &self,
        id: &JobId,
        stage: PipelineStage,
        started: Instant,
        err: PipelineError,
    ) -> PipelineError {
        warn!(job_id = %id, stage = %stage, error = %err, "stage failed");
        if let Err(store_err) = self.store.fail_stage(id).await {
            error!(job_id = %id, error = %store_err, "failed to record stage failure");
        }
        metrics::record_stage(
            stage.as_str(),
            "failed",
            started.elapsed().as_millis() as f64,
        );
        err
    }

    /// Fresh cancellation token for a stage, replacing any previous one.
    async fn begin_cancellable(&self, id: &JobId) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancellations
            .lock()
            .await
            .insert(id.clone(), token.clone());
        token
    }

    async fn end_cancellable(&self, id: &JobId) {
        self.cancellations.lock().await.remove(id);
    }
}

fn resolve_script(explicit: Option<&str>, record: &PipelineJob) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| record.script.as_ref().map(|s| s.screenplay.clone()))
}

/// Render one scene image and park it in the object store.
async fn render_scene(
    image: GenerationClient,
    objects: ObjectStore,
    job_id: JobId,
    aspect_ratio: String,
    schedule: PollSchedule,
    deadline: Duration,
    scene: Scene,
) -> GenerationResult {
    let request = GenerationRequest::image(prompts::image_prompt(&scene.description))
        .with_parameter("aspectRatio", aspect_ratio.as_str());

    let mut result = match image.submit(&request).await {
        Ok(Submission::Completed(result)) => result,
        Ok(Submission::Operation(handle)) => {
            // an image service that goes long-running gets its own, shorter wait
            let poller = JobPoller::new(image.clone(), schedule, deadline);
            let (_, outcome) = poller.wait(Operation::new(handle)).await;
            match outcome {
                PollOutcome::Succeeded(result) => result,
                PollOutcome::Failed(error) => GenerationResult::failed(error),
                PollOutcome::TimedOut { waited, .. } => {
                    GenerationResult::failed(GenerationError::new(
                        ErrorKind::TimedOut,
                        format!("image generation did not finish within {waited:?}"),
                    ))
                }
                PollOutcome::Cancelled => GenerationResult::failed(GenerationError::new(
                    ErrorKind::Permanent,
                    "image generation cancelled",
                )),
            }
        }
        Err(e) => return GenerationResult::failed(e.to_generation_error()),
    };

    if !result.is_succeeded() {
        return result;
    }

    match result.payload.take() {
        Some(GenerationPayload::Inline {
            bytes,
            content_type,
        }) => {
            let seed = format!("scene-{} {}", scene.index, scene.description);
            let key = ContentAddresser::path_for_job(
                "storyboards",
                &job_id,
                &seed,
                extension_for(&content_type),
            );
            match objects.put_bytes(&key, bytes, &content_type).await {
                Ok(uri) => GenerationResult::succeeded(GenerationPayload::location(uri)),
                Err(e) => GenerationResult::failed(GenerationError::new(
                    ErrorKind::Transient,
                    format!("failed to store scene image: {e}"),
                )),
            }
        }
        Some(location @ GenerationPayload::Location { .. }) => {
            result.payload = Some(location);
            result
        }
        None => result,
    }
}

/// Write the terminal animatic state into the job store.
async fn finalize_animatic(
    store: Arc<dyn JobStore>,
    objects: ObjectStore,
    id: JobId,
    seed: String,
    outcome: PollOutcome,
    latency_ms: f64,
) {
    let (label, update) = match outcome {
        PollOutcome::Succeeded(mut result) => match result.payload.take() {
            Some(GenerationPayload::Location { uri }) => {
                info!(job_id = %id, location = %uri, "animatic ready");
                ("succeeded", store.complete_animatic(&id, uri).await)
            }
            Some(GenerationPayload::Inline {
                bytes,
                content_type,
            }) => {
                let key =
                    ContentAddresser::path_for("animatics", &seed, extension_for(&content_type));
                match objects.put_bytes(&key, bytes, &content_type).await {
                    Ok(uri) => {
                        info!(job_id = %id, location = %uri, "animatic ready");
                        ("succeeded", store.complete_animatic(&id, uri).await)
                    }
                    Err(e) => {
                        let error = GenerationError::new(
                            ErrorKind::Transient,
                            format!("failed to store animatic video: {e}"),
                        );
                        warn!(job_id = %id, error = %error, "animatic upload failed");
                        ("failed", store.fail_animatic(&id, error).await)
                    }
                }
            }
            None => {
                let error = result.error.unwrap_or_else(|| {
                    GenerationError::new(
                        ErrorKind::Malformed,
                        "video operation completed without a payload",
                    )
                });
                warn!(job_id = %id, error = %error, "animatic failed");
                ("failed", store.fail_animatic(&id, error).await)
            }
        },
        PollOutcome::Failed(error) => {
            warn!(job_id = %id, error = %error, "animatic failed");
            ("failed", store.fail_animatic(&id, error).await)
        }
        PollOutcome::TimedOut { waited, polls } => {
            warn!(job_id = %id, waited_secs = waited.as_secs(), polls, "animatic timed out");
            let error = GenerationError::new(
                ErrorKind::TimedOut,
                format!("animatic did not finish within {waited:?} ({polls} polls)"),
            );
            ("timed_out", store.fail_animatic(&id, error).await)
        }
        PollOutcome::Cancelled => {
            info!(job_id = %id, "animatic cancelled");
            let error = GenerationError::new(ErrorKind::Permanent, "animatic cancelled");
            ("cancelled", store.fail_animatic(&id, error).await)
        }
    };

    if let Err(e) = update {
        error!(job_id = %id, error = %e, "failed to record animatic outcome");
    }
    metrics::record_stage(PipelineStage::Animatic.as_str(), label, latency_ms);
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}
