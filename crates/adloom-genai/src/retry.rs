//! Retry with exponential backoff and jitter.
//!
//! Retries on:
//! - Network errors and client-side attempt timeouts
//! - HTTP 429 (honors a Retry-After floor)
//! - HTTP 5xx
//!
//! Does NOT retry:
//! - Other 4xx (the request itself is wrong)
//! - Malformed responses (a protocol mismatch will not fix itself)
//! - Deadline timeouts and cancellations

use std::future::Future;
use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::{GenAiError, GenAiResult};
use crate::metrics::record_retry;

/// Retry policy for remote generation legs.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Fast policy for tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(3, Duration::from_millis(1), Duration::from_millis(5))
    }
}

/// Execute `op` under `policy`, retrying transient failures.
///
/// Each attempt runs inside a tracing span carrying the operation name and
/// attempt number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, op: F) -> GenAiResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = GenAiResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let span = info_span!("generation_attempt", operation = %operation, attempt);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = backoff_delay(policy, attempt, e.retry_after());

                warn!(
                    operation = %operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "generation attempt failed, retrying: {}",
                    e
                );

                record_retry(operation);

                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    // max_attempts >= 1, so the loop always returns before falling through.
    Err(GenAiError::transient("retry loop exhausted"))
}

/// Delay before the retry following failed attempt `attempt` (1-based), with
/// full jitter. A service-supplied Retry-After wins outright.
fn backoff_delay(policy: &RetryPolicy, attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(after) = retry_after {
        return after;
    }

    let base_ms = policy.base_delay.as_millis() as u64;
    let exp_delay = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp_delay.min(policy.max_delay.as_millis() as u64);

    // Time-based pseudo-randomization avoids pulling in a rand crate.
    let jittered = if capped > 0 {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(base_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_respects_retry_after() {
        let policy = RetryPolicy::default();
        let delay = backoff_delay(&policy, 1, Some(Duration::from_millis(2000)));
        assert_eq!(delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=10 {
            let delay = backoff_delay(&policy, attempt, None);
            assert!(delay >= policy.base_delay);
            assert!(delay <= policy.max_delay);
        }
    }

    #[tokio::test]
    async fn test_immediate_success_runs_once() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&RetryPolicy::for_tests(), "test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, GenAiError>(7) }
        })
        .await;

        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&RetryPolicy::for_tests(), "test_op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GenAiError::transient("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_short_circuits() {
        let calls = AtomicU32::new(0);

        let result: GenAiResult<()> = with_retry(&RetryPolicy::for_tests(), "test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GenAiError::permanent("rejected")) }
        })
        .await;

        assert!(matches!(result, Err(GenAiError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_exhaustion_surfaces_last_error() {
        let calls = AtomicU32::new(0);

        let result: GenAiResult<()> = with_retry(&RetryPolicy::for_tests(), "test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GenAiError::transient("still down")) }
        })
        .await;

        assert!(matches!(result, Err(GenAiError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
