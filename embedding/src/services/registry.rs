use lotr_config::{ProviderConfig, ProviderCredentials, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::{HashingEmbeddingProvider, HuggingFaceEmbeddingProvider, OpenAiEmbeddingProvider};
use crate::provider::EmbeddingProvider;
use crate::services::cache::CachedProvider;

/// Builds providers from configuration with explicitly passed credentials
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    pub fn create(
        config: &ProviderConfig,
        credentials: &ProviderCredentials,
    ) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
        let secret = credentials.secret_for(&config.id, config.kind)?;

        let provider: Arc<dyn EmbeddingProvider> = match (config.kind, secret) {
            (ProviderKind::OpenAi, Some(key)) => Arc::new(OpenAiEmbeddingProvider::new(config, key)?),
            (ProviderKind::HuggingFace, Some(token)) => {
                Arc::new(HuggingFaceEmbeddingProvider::new(config, token)?)
            }
            (ProviderKind::Hashing, _) => Arc::new(HashingEmbeddingProvider::from_config(config)),
            (kind, None) => {
                return Err(EmbeddingError::Config(lotr_config::ConfigError::MissingCredential {
                    provider: config.id.clone(),
                    variable: kind.as_str().to_string(),
                }))
            }
        };

        if config.cache_capacity > 0 {
            Ok(Arc::new(CachedProvider::new(provider, config.cache_capacity)))
        } else {
            Ok(provider)
        }
    }
}

/// Provider id to provider lookup shared by retrievers and reducers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(
        configs: &[ProviderConfig],
        credentials: &ProviderCredentials,
    ) -> EmbeddingResult<Self> {
        let mut registry = Self::new();
        for config in configs {
            let provider = EmbeddingProviderFactory::create(config, credentials)?;
            info!(
                provider = %config.id,
                kind = config.kind.as_str(),
                model = %provider.model(),
                dimension = provider.dimension(),
                "Initialized embedding provider"
            );
            registry.register(provider);
        }
        Ok(registry)
    }

    /// Register under the provider's own id, replacing any previous entry
    pub fn register(&mut self, provider: Arc<dyn EmbeddingProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn EmbeddingProvider>> {
        self.providers.get(id).cloned()
    }

    pub fn require(&self, id: &str) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
        self.get(id)
            .ok_or_else(|| EmbeddingError::UnknownProvider(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
