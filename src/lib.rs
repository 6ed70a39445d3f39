//! Dataset Cache Library
//!
//! A two-tier cache for expensive, deterministic dataset loads. Entity
//! collections are kept in a reclaimable memory tier and persisted as
//! versioned binary snapshots, with per-dataset locking so that concurrent
//! requests trigger a single load.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
