//! Shared domain types for the LOTR retrieval pipeline.
//!
//! Documents are created once at ingestion and shared as `Arc<Document>`
//! between the store, every retriever and the reduction stages.

pub mod document;
pub mod retrieval;

pub use document::*;
pub use retrieval::*;
