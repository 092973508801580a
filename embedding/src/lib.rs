//! Embedding providers for the retrieval pipeline.
//!
//! Every provider maps text to a fixed-length [`EmbeddingVector`] tagged with
//! the provider id, so vectors from different models are never compared.

pub mod error;
pub mod models;
pub mod provider;
pub mod services;
pub mod vector;

pub use error::{EmbeddingError, EmbeddingResult};
pub use models::{HashingEmbeddingProvider, HuggingFaceEmbeddingProvider, OpenAiEmbeddingProvider};
pub use provider::{check_input, EmbeddingProvider};
pub use services::{CachedProvider, EmbeddingCache, EmbeddingProviderFactory, ProviderRegistry};
pub use vector::{EmbeddingVector, VectorOps};
