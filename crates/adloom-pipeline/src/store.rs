//! Job record store.
//!
//! The trait is the seam for a persistent backend; the shipped
//! implementation keeps records in memory behind an `RwLock`. Mutations go
//! through named operations so every store applies them atomically, and
//! readers always receive copy-on-read snapshots.

use std::collections::HashMap;
use std::time::Duration;

use adloom_models::{
    BriefArtifact, GenerationError, JobId, PipelineJob, ScriptArtifact, StoryboardArtifact,
};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// How long a job record is kept after its last update.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Store for pipeline job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Copy-on-read snapshot of a job record.
    async fn get(&self, id: &JobId) -> PipelineResult<Option<PipelineJob>>;

    /// Load the record for `id`, creating a fresh one when absent.
    async fn get_or_create(&self, id: &JobId) -> PipelineResult<PipelineJob>;

    async fn record_brief(&self, id: &JobId, artifact: BriefArtifact) -> PipelineResult<()>;

    async fn record_script(&self, id: &JobId, artifact: ScriptArtifact) -> PipelineResult<()>;

    async fn record_storyboard(
        &self,
        id: &JobId,
        artifact: StoryboardArtifact,
    ) -> PipelineResult<()>;

    /// Mark the animatic stage as submitted and in flight.
    async fn begin_animatic(&self, id: &JobId, operation: Option<String>) -> PipelineResult<()>;

    async fn complete_animatic(&self, id: &JobId, location: String) -> PipelineResult<()>;

    async fn fail_animatic(&self, id: &JobId, error: GenerationError) -> PipelineResult<()>;

    /// Mark the most recent synchronous stage invocation as failed.
    async fn fail_stage(&self, id: &JobId) -> PipelineResult<()>;

    async fn list_ids(&self) -> PipelineResult<Vec<JobId>>;
}

/// In-memory job store, the shipped implementation.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, PipelineJob>>,
    retention: Duration,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Evict records idle longer than the retention window. Returns the
    /// number of records evicted.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = self.retention.as_secs() as i64;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.idle_seconds() < cutoff);
        let evicted = before - jobs.len();
        if evicted > 0 {
            info!(evicted, remaining = jobs.len(), "evicted expired job records");
        }
        evicted
    }

    async fn apply<F>(&self, id: &JobId, f: F) -> PipelineResult<()>
    where
        F: FnOnce(&mut PipelineJob),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(job) => {
                f(job);
                Ok(())
            }
            None => Err(PipelineError::not_found(format!("job '{id}' not found"))),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &JobId) -> PipelineResult<Option<PipelineJob>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn get_or_create(&self, id: &JobId) -> PipelineResult<PipelineJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.entry(id.clone()).or_insert_with(|| {
            debug!(job_id = %id, "creating job record");
            PipelineJob::new(id.clone())
        });
        Ok(job.clone())
    }

    async fn record_brief(&self, id: &JobId, artifact: BriefArtifact) -> PipelineResult<()> {
        self.apply(id, |job| job.record_brief(artifact)).await
    }

    async fn record_script(&self, id: &JobId, artifact: ScriptArtifact) -> PipelineResult<()> {
        self.apply(id, |job| job.record_script(artifact)).await
    }

    async fn record_storyboard(
        &self,
        id: &JobId,
        artifact: StoryboardArtifact,
    ) -> PipelineResult<()> {
        self.apply(id, |job| job.record_storyboard(artifact)).await
    }

    async fn begin_animatic(&self, id: &JobId, operation: Option<String>) -> PipelineResult<()> {
        self.apply(id, |job| job.begin_animatic(operation)).await
    }

    async fn complete_animatic(&self, id: &JobId, location: String) -> PipelineResult<()> {
        self.apply(id, |job| job.complete_animatic(location)).await
    }

    async fn fail_animatic(&self, id: &JobId, error: GenerationError) -> PipelineResult<()> {
        self.apply(id, |job| job.fail_animatic(error)).await
    }

    async fn fail_stage(&self, id: &JobId) -> PipelineResult<()> {
        self.apply(id, |job| job.fail_stage()).await
    }

    async fn list_ids(&self) -> PipelineResult<Vec<JobId>> {
        Ok(self.jobs.read().await.keys().cloned().collect())
    }
}
