//! S3-compatible artifact store for generated marketing assets.
//!
//! Wraps the AWS SDK for uploads to any S3-compatible endpoint and derives
//! readable, collision-free object paths for generated artifacts.

pub mod addressing;
pub mod client;
pub mod error;
pub mod operations;

pub use addressing::ContentAddresser;
pub use client::{ObjectStore, StorageConfig};
pub use error::{StorageError, StorageResult};
