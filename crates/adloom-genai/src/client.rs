//! Retry/timeout wrapper around a generation backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adloom_models::{GenerationKind, GenerationRequest, GenerationResult};

use crate::backends::{GenerationBackend, OperationHandle, RemoteProbe, Submission};
use crate::error::{GenAiError, GenAiResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryPolicy};

/// Wraps one backend with retry, backoff, and a per-attempt timeout.
///
/// Every leg (a submit, or a poll of a long-running operation) independently
/// runs through the retry policy. Cloning is cheap and shares the backend.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        retry: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            retry,
            attempt_timeout,
        }
    }

    pub fn kind(&self) -> GenerationKind {
        self.backend.kind()
    }

    /// Run one submit leg under the retry policy.
    pub async fn submit(&self, request: &GenerationRequest) -> GenAiResult<Submission> {
        let operation = leg_name(self.kind(), "submit");
        let started = Instant::now();

        let outcome = with_retry(&self.retry, &operation, || async {
            self.attempt(self.backend.submit(request)).await
        })
        .await;

        record_request(
            &operation,
            outcome_label(&outcome),
            started.elapsed().as_millis() as f64,
        );
        outcome
    }

    /// Invoke an immediate service and require a finished result.
    pub async fn invoke(&self, request: &GenerationRequest) -> GenAiResult<GenerationResult> {
        match self.submit(request).await? {
            Submission::Completed(result) => Ok(result),
            Submission::Operation(handle) => Err(GenAiError::permanent(format!(
                "{} backend answered with long-running operation {handle}; drive it with a poller",
                self.kind()
            ))),
        }
    }

    /// Run one poll leg for `handle` under the retry policy.
    pub async fn poll_operation(&self, handle: &OperationHandle) -> GenAiResult<RemoteProbe> {
        let operation = leg_name(self.kind(), "poll");
        let started = Instant::now();

        let outcome = with_retry(&self.retry, &operation, || async {
            self.attempt(self.backend.poll(handle)).await
        })
        .await;

        record_request(
            &operation,
            outcome_label(&outcome),
            started.elapsed().as_millis() as f64,
        );
        outcome
    }

    /// Bound one attempt by the per-attempt timeout. An elapsed attempt is
    /// transient: the next attempt may hit a healthy replica.
    async fn attempt<T>(
        &self,
        fut: impl std::future::Future<Output = GenAiResult<T>>,
    ) -> GenAiResult<T> {
        match tokio::time::timeout(self.attempt_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(GenAiError::transient(format!(
                "attempt exceeded {:?}",
                self.attempt_timeout
            ))),
        }
    }
}

fn leg_name(kind: GenerationKind, leg: &str) -> String {
    format!("{}_{leg}", kind.as_str())
}

fn outcome_label<T>(outcome: &GenAiResult<T>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adloom_models::GenerationPayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend that fails the first `fail_first` submits with a transient
    /// error, then succeeds.
    struct FlakyBackend {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl FlakyBackend {
        fn new(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for FlakyBackend {
        fn kind(&self) -> GenerationKind {
            GenerationKind::Text
        }

        async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(GenAiError::transient("flaky"))
            } else {
                Ok(Submission::Completed(GenerationResult::succeeded(
                    GenerationPayload::from_text("ok"),
                )))
            }
        }
    }

    struct RejectingBackend;

    #[async_trait]
    impl GenerationBackend for RejectingBackend {
        fn kind(&self) -> GenerationKind {
            GenerationKind::Text
        }

        async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
            Err(GenAiError::permanent("prompt rejected"))
        }
    }

    struct SlowBackend {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl GenerationBackend for SlowBackend {
        fn kind(&self) -> GenerationKind {
            GenerationKind::Text
        }

        async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(Submission::Completed(GenerationResult::succeeded(
                GenerationPayload::from_text("too late"),
            )))
        }
    }

    struct OperationBackend;

    #[async_trait]
    impl GenerationBackend for OperationBackend {
        fn kind(&self) -> GenerationKind {
            GenerationKind::Video
        }

        async fn submit(&self, _request: &GenerationRequest) -> GenAiResult<Submission> {
            Ok(Submission::Operation(OperationHandle(
                "operations/123".to_string(),
            )))
        }
    }

    fn client(backend: Arc<dyn GenerationBackend>) -> GenerationClient {
        GenerationClient::new(backend, RetryPolicy::for_tests(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_invoke_retries_transient_then_succeeds() {
        let backend = Arc::new(FlakyBackend::new(2));
        let result = client(backend.clone())
            .invoke(&GenerationRequest::text("hi"))
            .await
            .unwrap();

        assert_eq!(result.text(), Some("ok"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invoke_does_not_retry_permanent() {
        let backend = Arc::new(FlakyBackend::new(0));
        // Sanity: zero failures means a single call.
        client(backend.clone())
            .invoke(&GenerationRequest::text("hi"))
            .await
            .unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let result = client(Arc::new(RejectingBackend))
            .invoke(&GenerationRequest::text("hi"))
            .await;
        assert!(matches!(result, Err(GenAiError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_transient_and_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let backend = Arc::new(SlowBackend {
            calls: calls.clone(),
        });
        let client = GenerationClient::new(
            backend,
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
            Duration::from_millis(10),
        );

        let result = client.invoke(&GenerationRequest::text("hi")).await;
        assert!(matches!(result, Err(GenAiError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invoke_rejects_operation_outcome() {
        let result = client(Arc::new(OperationBackend))
            .invoke(&GenerationRequest::video("clip"))
            .await;
        assert!(matches!(result, Err(GenAiError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_submit_passes_operation_through() {
        let submission = client(Arc::new(OperationBackend))
            .submit(&GenerationRequest::video("clip"))
            .await
            .unwrap();
        match submission {
            Submission::Operation(handle) => assert_eq!(handle.as_str(), "operations/123"),
            Submission::Completed(_) => panic!("expected operation"),
        }
    }
}
