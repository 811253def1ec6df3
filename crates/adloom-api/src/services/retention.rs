//! Background eviction of expired job records.
//!
//! Jobs live in memory only; this sweeper keeps the map bounded by evicting
//! records that have been idle longer than the store's retention window.

use std::sync::Arc;
use std::time::Duration;

use adloom_pipeline::MemoryJobStore;
use tokio::time::interval;
use tracing::{debug, info};

/// Interval between retention sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Periodic job-record eviction service.
pub struct RetentionSweeper {
    jobs: Arc<MemoryJobStore>,
    enabled: bool,
}

impl RetentionSweeper {
    pub fn new(jobs: Arc<MemoryJobStore>) -> Self {
        let enabled = std::env::var("ENABLE_RETENTION_SWEEP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self { jobs, enabled }
    }

    /// Start the sweep loop.
    ///
    /// This function runs indefinitely and should be spawned as a background
    /// task.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Retention sweep is disabled");
            return;
        }

        info!("Starting retention sweeper (interval: {:?})", SWEEP_INTERVAL);

        let mut ticker = interval(SWEEP_INTERVAL);

        loop {
            ticker.tick().await;

            let evicted = self.check_once().await;
            if evicted == 0 {
                debug!("Retention sweep found nothing to evict");
            }
        }
    }

    /// Run a single sweep (for testing or manual invocation).
    pub async fn check_once(&self) -> usize {
        self.jobs.sweep_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adloom_models::JobId;
    use adloom_pipeline::JobStore;

    #[tokio::test]
    async fn test_check_once_evicts_expired_jobs() {
        let jobs = Arc::new(MemoryJobStore::new().with_retention(Duration::ZERO));
        jobs.get_or_create(&JobId::new()).await.unwrap();
        jobs.get_or_create(&JobId::new()).await.unwrap();

        let sweeper = RetentionSweeper::new(Arc::clone(&jobs));
        assert_eq!(sweeper.check_once().await, 2);
        assert!(jobs.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_once_keeps_fresh_jobs() {
        let jobs = Arc::new(MemoryJobStore::new().with_retention(Duration::from_secs(3600)));
        jobs.get_or_create(&JobId::new()).await.unwrap();

        let sweeper = RetentionSweeper::new(Arc::clone(&jobs));
        assert_eq!(sweeper.check_once().await, 0);
        assert_eq!(jobs.list_ids().await.unwrap().len(), 1);
    }
}
