//! LOTR Observability Library
//!
//! Logging and tracing infrastructure shared by the pipeline crates and the `lotr` service.
//!
//! # Features
//! - Structured JSON or pretty logging selected from the environment
//! - Pipeline stage events with counts and durations
//! - Logging macros for timed operations and provider calls
//! - HTTP middleware for request/response logging with request ids

pub mod stage_events;
pub mod middleware;
pub mod init;
pub mod macros;

pub use stage_events::*;
pub use middleware::*;
pub use init::*;

// Re-export tracing for convenience
pub use tracing::{debug, error, info, warn, trace, span, Level, Instrument};
pub use tracing::instrument;
