//! Long-running operation poller.
//!
//! Drives one submitted operation to a terminal phase:
//!
//! ```text
//! SUBMITTED --first not-done probe--> RUNNING
//! RUNNING   --done + payload-------> SUCCEEDED
//! RUNNING   --done + error---------> FAILED      (also: protocol mismatch)
//! any       --deadline elapsed-----> TIMED_OUT   (no poll after the deadline)
//! ```
//!
//! The poller consumes the operation; a terminal operation cannot be polled
//! again. Transient I/O on an individual poll leg is retried inside
//! [`GenerationClient::poll_operation`], which is distinct from the
//! operation's own completion state.

use std::time::{Duration, Instant};

use adloom_models::{ErrorKind, GenerationError, GenerationResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backends::{OperationHandle, RemoteProbe};
use crate::client::GenerationClient;

/// Poll interval schedule: starts at `initial_interval` and doubles up to
/// `max_interval`.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl PollSchedule {
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval,
        }
    }

    /// Next interval after `current`.
    fn advance(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_interval)
    }
}

/// Phase of a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationPhase {
    Submitted,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl OperationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPhase::Submitted => "submitted",
            OperationPhase::Running => "running",
            OperationPhase::Succeeded => "succeeded",
            OperationPhase::Failed => "failed",
            OperationPhase::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationPhase::Succeeded | OperationPhase::Failed | OperationPhase::TimedOut
        )
    }
}

/// A submitted operation and its polling history.
#[derive(Debug, Clone)]
pub struct Operation {
    pub handle: OperationHandle,
    pub submitted_at: Instant,
    pub poll_count: u32,
    pub last_poll_at: Option<Instant>,
    pub phase: OperationPhase,
}

impl Operation {
    pub fn new(handle: OperationHandle) -> Self {
        Self {
            handle,
            submitted_at: Instant::now(),
            poll_count: 0,
            last_poll_at: None,
            phase: OperationPhase::Submitted,
        }
    }

    fn record_poll(&mut self) {
        self.poll_count += 1;
        self.last_poll_at = Some(Instant::now());
    }
}

/// Terminal outcome of waiting on an operation.
#[derive(Debug)]
pub enum PollOutcome {
    Succeeded(GenerationResult),
    Failed(GenerationError),
    TimedOut { waited: Duration, polls: u32 },
    Cancelled,
}

/// Owns one operation for its whole polling lifetime.
pub struct JobPoller {
    client: GenerationClient,
    schedule: PollSchedule,
    deadline: Duration,
    cancel: CancellationToken,
}

impl JobPoller {
    pub fn new(client: GenerationClient, schedule: PollSchedule, deadline: Duration) -> Self {
        Self {
            client,
            schedule,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token; cancelling it stops the wait promptly.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive `operation` to a terminal phase.
    ///
    /// Consumes the poller and the operation, returning the operation with
    /// its final phase and poll accounting alongside the outcome.
    pub async fn wait(self, mut operation: Operation) -> (Operation, PollOutcome) {
        let mut interval = self.schedule.initial_interval;

        loop {
            let elapsed = operation.submitted_at.elapsed();
            let Some(remaining) = self.deadline.checked_sub(elapsed) else {
                return self.time_out(operation);
            };

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    operation.phase = OperationPhase::Failed;
                    info!(handle = %operation.handle, "operation wait cancelled");
                    return (operation, PollOutcome::Cancelled);
                }
                _ = tokio::time::sleep(interval.min(remaining)) => {}
            }

            // The deadline may have elapsed during the sleep.
            if operation.submitted_at.elapsed() >= self.deadline {
                return self.time_out(operation);
            }

            let probe = tokio::select! {
                _ = self.cancel.cancelled() => {
                    operation.phase = OperationPhase::Failed;
                    info!(handle = %operation.handle, "operation wait cancelled");
                    return (operation, PollOutcome::Cancelled);
                }
                probe = self.client.poll_operation(&operation.handle) => probe,
            };
            operation.record_poll();

            match probe {
                Ok(RemoteProbe::Pending) => {
                    if operation.phase == OperationPhase::Submitted {
                        operation.phase = OperationPhase::Running;
                    }
                    debug!(
                        handle = %operation.handle,
                        polls = operation.poll_count,
                        next_interval_ms = self.schedule.advance(interval).as_millis() as u64,
                        "operation still running"
                    );
                    interval = self.schedule.advance(interval);
                }
                Ok(RemoteProbe::Done(result)) => {
                    if result.is_succeeded() {
                        operation.phase = OperationPhase::Succeeded;
                        info!(
                            handle = %operation.handle,
                            polls = operation.poll_count,
                            "operation succeeded"
                        );
                        return (operation, PollOutcome::Succeeded(result));
                    }
                    operation.phase = OperationPhase::Failed;
                    let error = result.error.unwrap_or_else(|| {
                        GenerationError::new(
                            ErrorKind::Malformed,
                            "service reported failure without detail",
                        )
                    });
                    warn!(handle = %operation.handle, %error, "operation failed remotely");
                    return (operation, PollOutcome::Failed(error));
                }
                Err(e) => {
                    // Retries for this leg are already exhausted (or the
                    // failure is not retryable at all).
                    operation.phase = OperationPhase::Failed;
                    warn!(handle = %operation.handle, error = %e, "operation poll failed");
                    return (operation, PollOutcome::Failed(e.to_generation_error()));
                }
            }
        }
    }

    fn time_out(&self, mut operation: Operation) -> (Operation, PollOutcome) {
        operation.phase = OperationPhase::TimedOut;
        let waited = operation.submitted_at.elapsed();
        warn!(
            handle = %operation.handle,
            waited_ms = waited.as_millis() as u64,
            polls = operation.poll_count,
            "operation deadline elapsed"
        );
        let polls = operation.poll_count;
        (operation, PollOutcome::TimedOut { waited, polls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{GenerationBackend, Submission};
    use crate::error::{GenAiError, GenAiResult};
    use crate::retry::RetryPolicy;
    use adloom_models::{GenerationKind, GenerationPayload, GenerationRequest};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Backend that replays a scripted sequence of poll probes.
    struct ScriptedBackend {
        probes: Mutex<VecDeque<GenAiResult<RemoteProbe>>>,
        polls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(probes: Vec<GenAiResult<RemoteProbe>>) -> Self {
            Self {
                probes: Mutex::new(probes.into()),
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn kind(&self) -> GenerationKind {
            GenerationKind::Video
        }

        async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
            Ok(Submission::Operation(OperationHandle(
                "operations/test".to_string(),
            )))
        }

        async fn poll(&self, _handle: &OperationHandle) -> GenAiResult<RemoteProbe> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.probes.lock().unwrap().pop_front();
            next.unwrap_or(Ok(RemoteProbe::Pending))
        }
    }

    fn poller_for(backend: Arc<ScriptedBackend>, deadline: Duration) -> JobPoller {
        let client = GenerationClient::new(
            backend,
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
            Duration::from_secs(5),
        );
        JobPoller::new(
            client,
            PollSchedule::new(Duration::from_millis(5), Duration::from_millis(10)),
            deadline,
        )
    }

    fn done_ok(uri: &str) -> GenAiResult<RemoteProbe> {
        Ok(RemoteProbe::Done(GenerationResult::succeeded(
            GenerationPayload::location(uri),
        )))
    }

    fn done_failed(message: &str) -> GenAiResult<RemoteProbe> {
        Ok(RemoteProbe::Done(GenerationResult::failed(
            GenerationError::new(ErrorKind::Permanent, message),
        )))
    }

    #[test]
    fn test_schedule_doubles_to_cap() {
        let schedule = PollSchedule::new(Duration::from_millis(10), Duration::from_millis(50));
        let d1 = schedule.advance(Duration::from_millis(10));
        let d2 = schedule.advance(d1);
        let d3 = schedule.advance(d2);
        assert_eq!(d1, Duration::from_millis(20));
        assert_eq!(d2, Duration::from_millis(40));
        assert_eq!(d3, Duration::from_millis(50));
        assert_eq!(schedule.advance(d3), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_succeeds_on_done_probe() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(RemoteProbe::Pending),
            done_ok("https://cdn.example/clip.mp4"),
        ]));
        let poller = poller_for(backend.clone(), Duration::from_secs(5));

        let (operation, outcome) = poller
            .wait(Operation::new(OperationHandle("operations/test".into())))
            .await;

        assert_eq!(operation.phase, OperationPhase::Succeeded);
        assert!(operation.phase.is_terminal());
        assert_eq!(operation.poll_count, 2);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 2);
        match outcome {
            PollOutcome::Succeeded(result) => {
                assert_eq!(result.location(), Some("https://cdn.example/clip.mp4"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_error_fails_without_further_polls() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(RemoteProbe::Pending),
            Ok(RemoteProbe::Pending),
            done_failed("quota exceeded for project"),
        ]));
        let poller = poller_for(backend.clone(), Duration::from_secs(5));

        let (operation, outcome) = poller
            .wait(Operation::new(OperationHandle("operations/test".into())))
            .await;

        assert_eq!(operation.phase, OperationPhase::Failed);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
        match outcome {
            PollOutcome::Failed(error) => {
                assert_eq!(error.kind, ErrorKind::Permanent);
                assert!(error.message.contains("quota exceeded"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_times_out() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let poller = poller_for(backend.clone(), Duration::from_millis(30));
        let operation = Operation::new(OperationHandle("operations/test".into()));

        let started = Instant::now();
        let (operation, outcome) = poller.wait(operation).await;

        assert_eq!(operation.phase, OperationPhase::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(30));
        match outcome {
            PollOutcome::TimedOut { waited, polls } => {
                assert!(waited >= Duration::from_millis(30));
                assert_eq!(polls, operation.poll_count);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_deadline_never_polls() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let poller = poller_for(backend.clone(), Duration::ZERO);

        let (operation, outcome) = poller
            .wait(Operation::new(OperationHandle("operations/test".into())))
            .await;

        assert_eq!(operation.phase, OperationPhase::TimedOut);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 0);
        assert!(matches!(outcome, PollOutcome::TimedOut { polls: 0, .. }));
    }

    #[tokio::test]
    async fn test_malformed_poll_fails_without_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(GenAiError::malformed(
            "missing video payload",
            "{}",
        ))]));
        let poller = poller_for(backend.clone(), Duration::from_secs(5));

        let (operation, outcome) = poller
            .wait(Operation::new(OperationHandle("operations/test".into())))
            .await;

        assert_eq!(operation.phase, OperationPhase::Failed);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 1);
        match outcome {
            PollOutcome::Failed(error) => assert_eq!(error.kind, ErrorKind::Malformed),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transient_poll_exhaustion_fails_operation() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(GenAiError::transient("reset")),
            Err(GenAiError::transient("reset")),
            Err(GenAiError::transient("reset")),
        ]));
        let poller = poller_for(backend.clone(), Duration::from_secs(5));

        let (operation, outcome) = poller
            .wait(Operation::new(OperationHandle("operations/test".into())))
            .await;

        // One poll leg, three transport attempts inside it.
        assert_eq!(operation.poll_count, 1);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
        assert_eq!(operation.phase, OperationPhase::Failed);
        match outcome {
            PollOutcome::Failed(error) => assert_eq!(error.kind, ErrorKind::Transient),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_wait() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let client = GenerationClient::new(
            backend,
            RetryPolicy::for_tests(),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        let poller = JobPoller::new(
            client,
            PollSchedule::new(Duration::from_millis(50), Duration::from_millis(100)),
            Duration::from_secs(30),
        )
        .with_cancellation(cancel.clone());

        let handle = tokio::spawn(async move {
            poller
                .wait(Operation::new(OperationHandle("operations/test".into())))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let (operation, outcome) = handle.await.unwrap();
        assert!(matches!(outcome, PollOutcome::Cancelled));
        assert_eq!(operation.phase, OperationPhase::Failed);
    }
}
