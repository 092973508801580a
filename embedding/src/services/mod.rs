pub mod cache;
pub mod registry;

pub use cache::{CacheStats, CachedProvider, EmbeddingCache};
pub use registry::{EmbeddingProviderFactory, ProviderRegistry};
