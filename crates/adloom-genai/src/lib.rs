//! Clients for remote generative services.
//!
//! This crate provides:
//! - [`GenerationClient`]: retry/backoff and a per-attempt timeout around a
//!   backend, one leg at a time
//! - [`JobPoller`]: the long-running operation state machine
//! - HTTP backends for text, image, and video generation

pub mod backends;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod retry;

pub use backends::{
    GenerationBackend, ImageBackend, OperationHandle, RemoteProbe, Submission, TextBackend,
    VideoBackend,
};
pub use client::GenerationClient;
pub use config::GenAiConfig;
pub use error::{GenAiError, GenAiResult};
pub use poller::{JobPoller, Operation, OperationPhase, PollOutcome, PollSchedule};
pub use retry::{with_retry, RetryPolicy};
