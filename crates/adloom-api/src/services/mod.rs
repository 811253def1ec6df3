//! Background services.

pub mod retention;

pub use retention::RetentionSweeper;
