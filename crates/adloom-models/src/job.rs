//! Pipeline job records.
//!
//! A [`PipelineJob`] ties the four stages together under one id. Stage
//! results are append-only: recording a new artifact never erases an earlier
//! one, and a failed invocation leaves previous results untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generation::{GenerationError, UsageMetadata};
use crate::scene::StoryboardItem;

/// Unique identifier for a pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall job status.
///
/// Reflects the most recent stage invocation: `Running` while a stage (or the
/// animatic driver) is in flight, then `Succeeded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Brief,
    Script,
    Storyboard,
    Animatic,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Brief => "brief",
            PipelineStage::Script => "script",
            PipelineStage::Storyboard => "storyboard",
            PipelineStage::Animatic => "animatic",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Brief stage output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BriefArtifact {
    /// Marketing brief as markdown.
    pub markdown: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,

    pub created_at: DateTime<Utc>,
}

impl BriefArtifact {
    pub fn new(markdown: impl Into<String>, usage: Option<UsageMetadata>) -> Self {
        Self {
            markdown: markdown.into(),
            usage,
            created_at: Utc::now(),
        }
    }
}

/// Script stage output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScriptArtifact {
    /// 30-second spot script as screenplay text.
    pub screenplay: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,

    pub created_at: DateTime<Utc>,
}

impl ScriptArtifact {
    pub fn new(screenplay: impl Into<String>, usage: Option<UsageMetadata>) -> Self {
        Self {
            screenplay: screenplay.into(),
            usage,
            created_at: Utc::now(),
        }
    }
}

/// Storyboard stage output: one item per scene, in scene order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoryboardArtifact {
    pub items: Vec<StoryboardItem>,

    /// Wall-clock time for the whole fanout.
    pub latency_ms: u64,

    pub created_at: DateTime<Utc>,
}

impl StoryboardArtifact {
    pub fn new(items: Vec<StoryboardItem>, latency_ms: u64) -> Self {
        Self {
            items,
            latency_ms,
            created_at: Utc::now(),
        }
    }

    /// Number of items that rendered successfully.
    pub fn succeeded_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_succeeded()).count()
    }
}

/// Animatic stage phase as seen by status readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnimaticPhase {
    Running,
    Succeeded,
    Failed,
}

impl AnimaticPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimaticPhase::Running => "running",
            AnimaticPhase::Succeeded => "succeeded",
            AnimaticPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnimaticPhase::Succeeded | AnimaticPhase::Failed)
    }
}

impl fmt::Display for AnimaticPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Animatic stage state, written only by the driver task that owns the job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnimaticArtifact {
    pub phase: AnimaticPhase,

    /// Remote operation handle, kept for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Final video location, present once the phase is `Succeeded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnimaticArtifact {
    /// Fresh artifact for a just-submitted remote operation.
    pub fn running(operation: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            phase: AnimaticPhase::Running,
            operation,
            location: None,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn succeed(&mut self, location: impl Into<String>) {
        self.phase = AnimaticPhase::Succeeded;
        self.location = Some(location.into());
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: GenerationError) {
        self.phase = AnimaticPhase::Failed;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}

/// A pipeline job and everything its stages have produced so far.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineJob {
    pub id: JobId,

    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub brief: Option<BriefArtifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptArtifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyboard: Option<StoryboardArtifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub animatic: Option<AnimaticArtifact>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineJob {
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Running,
            brief: None,
            script: None,
            storyboard: None,
            animatic: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn record_brief(&mut self, artifact: BriefArtifact) {
        self.brief = Some(artifact);
        self.status = JobStatus::Succeeded;
        self.touch();
    }

    pub fn record_script(&mut self, artifact: ScriptArtifact) {
        self.script = Some(artifact);
        self.status = JobStatus::Succeeded;
        self.touch();
    }

    pub fn record_storyboard(&mut self, artifact: StoryboardArtifact) {
        self.storyboard = Some(artifact);
        self.status = JobStatus::Succeeded;
        self.touch();
    }

    /// Mark the animatic stage as submitted and in flight.
    pub fn begin_animatic(&mut self, operation: Option<String>) {
        self.animatic = Some(AnimaticArtifact::running(operation));
        self.status = JobStatus::Running;
        self.touch();
    }

    pub fn complete_animatic(&mut self, location: impl Into<String>) {
        if let Some(animatic) = self.animatic.as_mut() {
            animatic.succeed(location);
        }
        self.status = JobStatus::Succeeded;
        self.touch();
    }

    pub fn fail_animatic(&mut self, error: GenerationError) {
        if let Some(animatic) = self.animatic.as_mut() {
            animatic.fail(error);
        }
        self.status = JobStatus::Failed;
        self.touch();
    }

    /// Mark the most recent synchronous stage invocation as failed.
    pub fn fail_stage(&mut self) {
        self.status = JobStatus::Failed;
        self.touch();
    }

    /// Age of the last update, in seconds.
    pub fn idle_seconds(&self) -> i64 {
        (Utc::now() - self.updated_at).num_seconds()
    }
}
