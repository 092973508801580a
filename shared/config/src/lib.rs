//! Configuration for the LOTR retrieval pipeline.
//!
//! The pipeline is described by a JSON file ([`PipelineConfig`]). API keys are
//! never read by providers themselves: [`ProviderCredentials::from_env`] resolves
//! them once at startup and the result is passed into provider constructors.

pub mod credentials;
pub mod error;
pub mod pipeline;

pub use credentials::ProviderCredentials;
pub use error::ConfigError;
pub use pipeline::*;
