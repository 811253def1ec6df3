//! End-to-end pipeline flows over scripted in-memory backends.
//!
//! No network is involved: generation backends are replaced by fakes that
//! answer with stored-location payloads, so the object store client is
//! constructed but never called.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adloom_genai::{
    GenAiError, GenAiResult, GenerationBackend, GenerationClient, OperationHandle, PollSchedule,
    RemoteProbe, RetryPolicy, Submission,
};
use adloom_models::{
    AnimaticPhase, GenerationKind, GenerationPayload, GenerationRequest, GenerationResult, JobId,
};
use adloom_pipeline::{
    JobStore, MemoryJobStore, PipelineConfig, PipelineError, PipelineOrchestrator,
};
use adloom_storage::{ObjectStore, StorageConfig};
use async_trait::async_trait;

/// Pops one canned text response per submit and records every prompt.
struct ScriptedText {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedText {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedText {
    fn kind(&self) -> GenerationKind {
        GenerationKind::Text
    }

    async fn submit(&self, request: &GenerationRequest) -> GenAiResult<Submission> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(text) => Ok(Submission::Completed(GenerationResult::succeeded(
                GenerationPayload::from_text(text),
            ))),
            None => Err(GenAiError::permanent("no scripted text response left")),
        }
    }
}

/// Answers every image submit with a stored-location result.
struct LocationImages {
    submits: AtomicU32,
}

impl LocationImages {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            submits: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl GenerationBackend for LocationImages {
    fn kind(&self) -> GenerationKind {
        GenerationKind::Image
    }

    async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Submission::Completed(GenerationResult::succeeded(
            GenerationPayload::location(format!("s3://test-bucket/storyboards/frame-{n}.png")),
        )))
    }
}

/// Starts a long-running operation, stays pending for `pending_polls` polls,
/// then reports a finished location result.
struct SlowVideo {
    pending_polls: u32,
    polls: AtomicU32,
}

impl SlowVideo {
    fn new(pending_polls: u32) -> Arc<Self> {
        Arc::new(Self {
            pending_polls,
            polls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl GenerationBackend for SlowVideo {
    fn kind(&self) -> GenerationKind {
        GenerationKind::Video
    }

    async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
        Ok(Submission::Operation(OperationHandle(
            "operations/video-1".to_string(),
        )))
    }

    async fn poll(&self, _handle: &OperationHandle) -> GenAiResult<RemoteProbe> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.pending_polls {
            Ok(RemoteProbe::Pending)
        } else {
            Ok(RemoteProbe::Done(GenerationResult::succeeded(
                GenerationPayload::location("s3://test-bucket/animatics/spot.mp4".to_string()),
            )))
        }
    }
}

fn client(backend: Arc<dyn GenerationBackend>) -> GenerationClient {
    let retry = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1));
    GenerationClient::new(backend, retry, Duration::from_secs(5))
}

async fn orchestrator(
    text: Arc<dyn GenerationBackend>,
    image: Arc<dyn GenerationBackend>,
    video: Arc<dyn GenerationBackend>,
) -> (PipelineOrchestrator, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    let objects = ObjectStore::new(StorageConfig {
        endpoint_url: "http://127.0.0.1:1".to_string(),
        access_key_id: "test".to_string(),
        secret_access_key: "test".to_string(),
        bucket: "test-bucket".to_string(),
        region: "auto".to_string(),
    })
    .await
    .unwrap();

    let config = PipelineConfig {
        poll_schedule: PollSchedule::new(Duration::from_millis(10), Duration::from_millis(20)),
        ..PipelineConfig::default()
    };

    let orchestrator = PipelineOrchestrator::new(
        client(text),
        client(image),
        client(video),
        store.clone(),
        objects,
        config,
    );
    (orchestrator, store)
}

#[tokio::test]
async fn test_brief_then_script_uses_stored_brief() {
    let text = ScriptedText::new(&[
        "### Objective\nMake cold brew the default order.",
        "INT. COFFEE SHOP - DAY\nA barista slides a cold brew across the counter.",
    ]);
    let (orchestrator, store) =
        orchestrator(text.clone(), LocationImages::new(), SlowVideo::new(0)).await;

    let (id, brief) = orchestrator
        .create_brief(None, "Launch a cold brew line for commuters")
        .await
        .unwrap();
    assert!(brief.markdown.contains("Objective"));

    let (script_id, script) = orchestrator
        .create_script(Some(id.clone()), None, None)
        .await
        .unwrap();
    assert_eq!(script_id, id);
    assert!(script.screenplay.contains("INT. COFFEE SHOP"));

    let prompts = text.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Launch a cold brew line for commuters"));
    assert!(prompts[1].contains("=== PRIOR BRIEF ==="));
    assert!(prompts[1].contains("Make cold brew the default order."));

    let job = store.get(&id).await.unwrap().unwrap();
    assert!(job.brief.is_some());
    assert!(job.script.is_some());
}

#[tokio::test]
async fn test_script_without_brief_or_prompt_is_rejected() {
    let text = ScriptedText::new(&[]);
    let (orchestrator, _store) =
        orchestrator(text.clone(), LocationImages::new(), SlowVideo::new(0)).await;

    let err = orchestrator
        .create_script(None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput(_)));
    assert!(text.prompts().is_empty());
}

#[tokio::test]
async fn test_storyboard_renders_every_scene() {
    let text = ScriptedText::new(&[concat!(
        r#"[{"scene": 1, "description": "Sunrise over the bay"},"#,
        r#" {"scene": 2, "description": "Barista pours cold brew"},"#,
        r#" {"scene": 3, "description": "Logo on a frosted cup"}]"#,
    )]);
    let (orchestrator, store) =
        orchestrator(text, LocationImages::new(), SlowVideo::new(0)).await;

    let (id, storyboard) = orchestrator
        .create_storyboard(None, Some("INT. COFFEE SHOP - DAY\nA quiet morning."), None)
        .await
        .unwrap();

    assert_eq!(storyboard.items.len(), 3);
    assert_eq!(storyboard.succeeded_count(), 3);
    for (i, item) in storyboard.items.iter().enumerate() {
        assert_eq!(item.scene_index, (i + 1) as u32);
        assert!(item.is_succeeded());
        let location = item.output_location.as_deref().unwrap();
        assert!(location.starts_with("s3://test-bucket/"));
    }

    let job = store.get(&id).await.unwrap().unwrap();
    assert!(job.storyboard.is_some());
}

#[tokio::test]
async fn test_storyboard_without_script_makes_no_remote_calls() {
    let text = ScriptedText::new(&[]);
    let (orchestrator, _store) =
        orchestrator(text.clone(), LocationImages::new(), SlowVideo::new(0)).await;

    let err = orchestrator
        .create_storyboard(None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput(_)));
    assert!(text.prompts().is_empty());
}

#[tokio::test]
async fn test_animatic_runs_in_background() {
    let text = ScriptedText::new(&["Open on sunrise, cut to the pour, end on the logo."]);
    let (orchestrator, _store) =
        orchestrator(text, LocationImages::new(), SlowVideo::new(2)).await;

    let id = orchestrator
        .start_animatic(None, Some("INT. COFFEE SHOP - DAY\nThe pour."), Some(8))
        .await
        .unwrap();

    // the start call returns while the remote operation is still pending
    let status = orchestrator.animatic_status(&id).await.unwrap();
    assert_eq!(status.phase, AnimaticPhase::Running);
    assert_eq!(status.operation.as_deref(), Some("operations/video-1"));

    let mut settled = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let status = orchestrator.animatic_status(&id).await.unwrap();
        if status.phase.is_terminal() {
            settled = Some(status);
            break;
        }
    }

    let settled = settled.expect("animatic never settled");
    assert_eq!(settled.phase, AnimaticPhase::Succeeded);
    assert_eq!(
        settled.location.as_deref(),
        Some("s3://test-bucket/animatics/spot.mp4")
    );
}

#[tokio::test]
async fn test_animatic_without_script_makes_no_remote_calls() {
    let text = ScriptedText::new(&[]);
    let (orchestrator, _store) =
        orchestrator(text.clone(), LocationImages::new(), SlowVideo::new(0)).await;

    let err = orchestrator
        .start_animatic(None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput(_)));
    assert!(text.prompts().is_empty());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let (orchestrator, _store) = orchestrator(
        ScriptedText::new(&[]),
        LocationImages::new(),
        SlowVideo::new(0),
    )
    .await;

    let err = orchestrator.animatic_status(&JobId::new()).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)));

    assert!(!orchestrator.cancel(&JobId::new()).await);
}
