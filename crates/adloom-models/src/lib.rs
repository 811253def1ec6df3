//! Shared data models for the AdLoom pipeline.
//!
//! This crate defines the types that cross crate boundaries:
//! - Generation requests/results exchanged with remote generative services
//! - Scenes and storyboard items
//! - The pipeline job record and its per-stage artifacts
//! - Slug derivation for artifact naming

pub mod generation;
pub mod job;
pub mod scene;
pub mod slug;

pub use generation::{
    ErrorKind, GenerationError, GenerationKind, GenerationPayload, GenerationRequest,
    GenerationResult, GenerationStatus, UsageMetadata,
};
pub use job::{
    AnimaticArtifact, AnimaticPhase, BriefArtifact, JobId, JobStatus, PipelineJob, PipelineStage,
    ScriptArtifact, StoryboardArtifact,
};
pub use scene::{Scene, SceneStatus, StoryboardItem};
pub use slug::{slugify, MAX_SLUG_LEN};
