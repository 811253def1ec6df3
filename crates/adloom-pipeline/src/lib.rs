//! Stage orchestration for the adloom generation pipeline.
//!
//! Coordinates the brief, script, storyboard and animatic stages on top of
//! `adloom-genai` clients and the `adloom-storage` object store, tracking
//! per-job state in a [`JobStore`].

pub mod error;
pub mod fanout;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;
pub mod scenes;
pub mod store;

pub use error::{PipelineError, PipelineResult};
pub use fanout::{SceneFanout, DEFAULT_SCENE_CONCURRENCY};
pub use orchestrator::{PipelineConfig, PipelineOrchestrator};
pub use scenes::{split_scenes, FALLBACK_SCENE};
pub use store::{JobStore, MemoryJobStore, DEFAULT_RETENTION};
