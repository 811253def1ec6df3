//! Pipeline stage metrics.
//!
//! Counters and latency histograms per stage ("brief", "script",
//! "storyboard", "animatic"), plus per-scene outcomes for the fanout.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total stage invocations by stage and outcome.
    pub const STAGE_TOTAL: &str = "pipeline_stage_total";

    /// Stage latency in seconds by stage.
    pub const STAGE_LATENCY_SECONDS: &str = "pipeline_stage_latency_seconds";

    /// Total storyboard scenes by outcome.
    pub const SCENES_TOTAL: &str = "pipeline_scenes_total";
}

/// Record a completed stage invocation.
pub fn record_stage(stage: &str, outcome: &str, latency_ms: f64) {
    counter!(
        names::STAGE_TOTAL,
        "stage" => stage.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::STAGE_LATENCY_SECONDS,
        "stage" => stage.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record one scene outcome from a fanout.
pub fn record_scene(outcome: &str) {
    counter!(
        names::SCENES_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
