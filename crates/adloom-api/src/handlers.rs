//! Request handlers.

pub mod health;
pub mod marketing;

pub use health::*;
pub use marketing::*;
