//! Generation call metrics.
//!
//! Counters and latency histograms for every remote generation leg, labelled
//! by logical operation ("text_generate", "video_poll", ...).

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total generation legs by operation and outcome.
    pub const REQUESTS_TOTAL: &str = "genai_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "genai_retries_total";

    /// Leg latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "genai_latency_seconds";
}

/// Record a completed generation leg.
pub fn record_request(operation: &str, outcome: &str, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }
}
