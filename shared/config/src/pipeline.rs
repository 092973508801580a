use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_K: usize = 4;
pub const DEFAULT_FETCH_K: usize = 20;
pub const DEFAULT_LAMBDA_MULT: f32 = 0.5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;
pub const DEFAULT_NUM_CLUSTERS: usize = 10;
pub const DEFAULT_NUM_CLOSEST: usize = 1;
pub const DEFAULT_CLUSTER_SEED: u64 = 42;
pub const DEFAULT_EMBED_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Backend that produces vectors for a provider id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[serde(rename = "hashing")]
    Hashing,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Hashing => "hashing",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub model: String,
    /// Expected vector length; providers fall back to their model table when unset
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Dedicated inference endpoint (HuggingFace only)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Entries kept by the per-provider text cache, 0 disables it
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_max_input_chars() -> usize {
    32_000
}

fn default_cache_capacity() -> usize {
    10_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Similarity,
    Mmr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
    InnerProduct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    pub id: String,
    pub provider: String,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Candidate pool size for MMR
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 is pure diversity
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_fetch_k() -> usize {
    DEFAULT_FETCH_K
}

fn default_lambda_mult() -> f32 {
    DEFAULT_LAMBDA_MULT
}

/// How the merged sequence is shrunk before reordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ReductionConfig {
    RedundancyFilter {
        #[serde(default = "default_similarity_threshold")]
        similarity_threshold: f32,
    },
    ClusteringFilter {
        #[serde(default = "default_num_clusters")]
        num_clusters: usize,
        #[serde(default = "default_num_closest")]
        num_closest: usize,
        /// Emit representatives in merged order instead of cluster order
        #[serde(default = "default_true")]
        sorted: bool,
        #[serde(default = "default_cluster_seed")]
        seed: u64,
    },
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_num_clusters() -> usize {
    DEFAULT_NUM_CLUSTERS
}

fn default_num_closest() -> usize {
    DEFAULT_NUM_CLOSEST
}

fn default_cluster_seed() -> u64 {
    DEFAULT_CLUSTER_SEED
}

impl ReductionConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ReductionConfig::RedundancyFilter { .. } => "redundancy-filter",
            ReductionConfig::ClusteringFilter { .. } => "clustering-filter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_answer_model() -> String {
    "gpt-4".to_string()
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            model: default_answer_model(),
            temperature: 0.0,
            base_url: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub providers: Vec<ProviderConfig>,
    pub retrievers: Vec<RetrieverConfig>,
    /// Provider used for the redundancy/clustering embeddings
    pub reduction_provider: String,
    pub reduction: ReductionConfig,
    #[serde(default = "default_true")]
    pub reorder: bool,
    /// Let failed retrievers contribute nothing instead of failing the query
    #[serde(default)]
    pub partial_results: bool,
    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub answer: Option<AnswerConfig>,
}

fn default_true() -> bool {
    true
}

fn default_embed_timeout_ms() -> u64 {
    DEFAULT_EMBED_TIMEOUT_MS
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            providers = config.providers.len(),
            retrievers = config.retrievers.len(),
            reduction = config.reduction.name(),
            "Loaded pipeline config"
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Two MiniLM retrievers (plain similarity and MMR) whose merged output
    /// is clustered with OpenAI embeddings.
    pub fn lotr_defaults() -> Self {
        Self {
            providers: vec![
                ProviderConfig {
                    id: "minilm".to_string(),
                    kind: ProviderKind::HuggingFace,
                    model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                    dimension: Some(384),
                    base_url: None,
                    endpoint_url: None,
                    timeout_secs: default_provider_timeout_secs(),
                    max_input_chars: default_max_input_chars(),
                    cache_capacity: default_cache_capacity(),
                },
                ProviderConfig {
                    id: "multi-qa-minilm".to_string(),
                    kind: ProviderKind::HuggingFace,
                    model: "sentence-transformers/multi-qa-MiniLM-L6-dot-v1".to_string(),
                    dimension: Some(384),
                    base_url: None,
                    endpoint_url: None,
                    timeout_secs: default_provider_timeout_secs(),
                    max_input_chars: default_max_input_chars(),
                    cache_capacity: default_cache_capacity(),
                },
                ProviderConfig {
                    id: "openai".to_string(),
                    kind: ProviderKind::OpenAi,
                    model: "text-embedding-ada-002".to_string(),
                    dimension: Some(1536),
                    base_url: None,
                    endpoint_url: None,
                    timeout_secs: default_provider_timeout_secs(),
                    max_input_chars: default_max_input_chars(),
                    cache_capacity: default_cache_capacity(),
                },
            ],
            retrievers: vec![
                RetrieverConfig {
                    id: "minilm-similarity".to_string(),
                    provider: "minilm".to_string(),
                    search_type: SearchType::Similarity,
                    k: 5,
                    fetch_k: DEFAULT_FETCH_K,
                    lambda_mult: DEFAULT_LAMBDA_MULT,
                    metric: DistanceMetric::Cosine,
                },
                RetrieverConfig {
                    id: "multi-qa-mmr".to_string(),
                    provider: "multi-qa-minilm".to_string(),
                    search_type: SearchType::Mmr,
                    k: 5,
                    fetch_k: DEFAULT_FETCH_K,
                    lambda_mult: DEFAULT_LAMBDA_MULT,
                    metric: DistanceMetric::InnerProduct,
                },
            ],
            reduction_provider: "openai".to_string(),
            reduction: ReductionConfig::ClusteringFilter {
                num_clusters: DEFAULT_NUM_CLUSTERS,
                num_closest: DEFAULT_NUM_CLOSEST,
                sorted: true,
                seed: DEFAULT_CLUSTER_SEED,
            },
            reorder: true,
            partial_results: false,
            embed_timeout_ms: DEFAULT_EMBED_TIMEOUT_MS,
            corpus: CorpusConfig::default(),
            answer: Some(AnswerConfig::default()),
        }
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn retriever(&self, id: &str) -> Option<&RetrieverConfig> {
        self.retrievers.iter().find(|r| r.id == id)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let mut provider_ids = HashSet::new();
        for provider in &self.providers {
            if !provider_ids.insert(provider.id.as_str()) {
                return Err(ConfigError::DuplicateId { kind: "provider", id: provider.id.clone() });
            }
            if provider.model.trim().is_empty() {
                return Err(ConfigError::invalid(format!("providers.{}.model", provider.id), "must not be empty"));
            }
            if provider.dimension == Some(0) {
                return Err(ConfigError::invalid(format!("providers.{}.dimension", provider.id), "must be positive"));
            }
            if provider.max_input_chars == 0 {
                return Err(ConfigError::invalid(format!("providers.{}.max_input_chars", provider.id), "must be positive"));
            }
        }

        let mut retriever_ids = HashSet::new();
        for retriever in &self.retrievers {
            if !retriever_ids.insert(retriever.id.as_str()) {
                return Err(ConfigError::DuplicateId { kind: "retriever", id: retriever.id.clone() });
            }
            if !provider_ids.contains(retriever.provider.as_str()) {
                return Err(ConfigError::UnknownProvider {
                    provider: retriever.provider.clone(),
                    referenced_by: format!("retriever '{}'", retriever.id),
                });
            }
            if retriever.k == 0 {
                return Err(ConfigError::invalid(format!("retrievers.{}.k", retriever.id), "must be at least 1"));
            }
            if retriever.search_type == SearchType::Mmr {
                if retriever.fetch_k < retriever.k {
                    return Err(ConfigError::invalid(
                        format!("retrievers.{}.fetch_k", retriever.id),
                        format!("must be >= k ({})", retriever.k),
                    ));
                }
                if !(0.0..=1.0).contains(&retriever.lambda_mult) {
                    return Err(ConfigError::invalid(
                        format!("retrievers.{}.lambda_mult", retriever.id),
                        "must be within [0, 1]",
                    ));
                }
            }
        }

        if !provider_ids.contains(self.reduction_provider.as_str()) {
            return Err(ConfigError::UnknownProvider {
                provider: self.reduction_provider.clone(),
                referenced_by: "reduction_provider".to_string(),
            });
        }

        match &self.reduction {
            ReductionConfig::RedundancyFilter { similarity_threshold } => {
                if !similarity_threshold.is_finite() || !(-1.0..=1.0).contains(similarity_threshold) {
                    return Err(ConfigError::invalid("reduction.similarity_threshold", "must be within [-1, 1]"));
                }
            }
            ReductionConfig::ClusteringFilter { num_clusters, num_closest, .. } => {
                if *num_clusters == 0 {
                    return Err(ConfigError::invalid("reduction.num_clusters", "must be positive"));
                }
                if *num_closest == 0 {
                    return Err(ConfigError::invalid("reduction.num_closest", "must be positive"));
                }
            }
        }

        if self.embed_timeout_ms == 0 {
            return Err(ConfigError::invalid("embed_timeout_ms", "must be positive"));
        }

        if self.corpus.chunk_size == 0 {
            return Err(ConfigError::invalid("corpus.chunk_size", "must be positive"));
        }
        if self.corpus.chunk_overlap >= self.corpus.chunk_size {
            return Err(ConfigError::invalid("corpus.chunk_overlap", "must be smaller than chunk_size"));
        }

        Ok(())
    }
}
