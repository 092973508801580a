//! Multi-retriever fusion and reduction pipeline.
//!
//! A query fans out to several retrievers, each backed by its own embedding
//! provider. Their results are merged round-robin, reduced by a redundancy or
//! clustering filter, reordered so the best documents sit at the edges, and
//! optionally handed to an answering model.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

pub use errors::{PipelineError, PipelineResult};
pub use services::{DocumentStore, Pipeline, PipelineOutput};
