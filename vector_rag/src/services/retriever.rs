use embedding::{EmbeddingProvider, EmbeddingVector, VectorOps};
use lotr_config::{RetrieverConfig, SearchType};
use lotr_models::{RetrievalResult, ScoredDocument};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::RetrieverError;
use crate::services::store::{DocumentStore, StoreSnapshot, VectorIndex};

/// One (store, provider, search strategy) combination
pub struct Retriever {
    config: RetrieverConfig,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<DocumentStore>,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(
        config: RetrieverConfig,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<DocumentStore>,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            embed_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Configured result count
    pub fn k(&self) -> usize {
        self.config.k
    }

    pub fn search_type(&self) -> SearchType {
        self.config.search_type
    }

    /// Up to `k` documents for `query`, most relevant first
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrieverError> {
        if k == 0 {
            return Err(RetrieverError::InvalidK {
                retriever: self.config.id.clone(),
                k,
            });
        }

        let snapshot = self.store.snapshot();
        let index = snapshot
            .index(self.provider.id())
            .ok_or_else(|| RetrieverError::MissingIndex {
                retriever: self.config.id.clone(),
                provider: self.provider.id().to_string(),
            })?;

        let query_vector = self.embed_query(query).await?;

        let ranked = match self.config.search_type {
            SearchType::Similarity => index.nearest(query_vector.values(), k, self.config.metric),
            SearchType::Mmr => self.mmr(index, query_vector.values(), k),
        };

        debug!(
            retriever = %self.config.id,
            search_type = ?self.config.search_type,
            requested = k,
            returned = ranked.len(),
            "Retrieved documents"
        );

        Ok(to_result(&self.config.id, &snapshot, ranked))
    }

    async fn embed_query(&self, query: &str) -> Result<EmbeddingVector, RetrieverError> {
        match tokio::time::timeout(self.embed_timeout, self.provider.embed(query)).await {
            Ok(Ok(vector)) => Ok(vector),
            Ok(Err(source)) => Err(RetrieverError::Embedding {
                retriever: self.config.id.clone(),
                source,
            }),
            Err(_) => Err(RetrieverError::Timeout {
                retriever: self.config.id.clone(),
                provider: self.provider.id().to_string(),
                timeout_ms: self.embed_timeout.as_millis() as u64,
            }),
        }
    }

    fn mmr(&self, index: &VectorIndex, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let fetch_k = self.config.fetch_k.max(k);
        let candidates = index.nearest(query, fetch_k, self.config.metric);
        let vectors: Vec<&[f32]> = candidates
            .iter()
            .filter_map(|(row, _)| index.vector(*row).map(|v| &v[..]))
            .collect();

        maximal_marginal_relevance(query, &vectors, k, self.config.lambda_mult)
            .into_iter()
            .map(|pos| candidates[pos])
            .collect()
    }
}

/// Greedy MMR over `candidates` (already in relevance order).
///
/// Returns positions into `candidates`. Ties go to the earlier candidate.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| VectorOps::cosine_similarity(query, c))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    // Highest similarity to anything already selected, per candidate
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k.min(candidates.len()) {
        let mut best: Option<(usize, f32)> = None;

        for (i, rel) in relevance.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let score = if selected.is_empty() {
                *rel
            } else {
                lambda_mult * rel - (1.0 - lambda_mult) * redundancy[i]
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let Some((pick, _)) = best else { break };
        selected.push(pick);

        for (i, candidate) in candidates.iter().enumerate() {
            let sim = VectorOps::cosine_similarity(candidates[pick], candidate);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }
    }

    selected
}

fn to_result(retriever: &str, snapshot: &StoreSnapshot, ranked: Vec<(usize, f32)>) -> RetrievalResult {
    let hits = ranked
        .into_iter()
        .filter_map(|(row, score)| {
            snapshot
                .document(row)
                .map(|doc| ScoredDocument::new(Arc::clone(doc), score))
        })
        .collect();
    RetrievalResult::new(retriever, hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use embedding::{EmbeddingResult, HashingEmbeddingProvider};
    use lotr_config::DistanceMetric;
    use lotr_models::{Document, SourceMetadata};

    fn config(search_type: SearchType) -> RetrieverConfig {
        RetrieverConfig {
            id: "test-retriever".to_string(),
            provider: "local".to_string(),
            search_type,
            k: 2,
            fetch_k: 20,
            lambda_mult: 0.5,
            metric: DistanceMetric::Cosine,
        }
    }

    async fn store_with(provider: Arc<dyn EmbeddingProvider>, texts: &[&str]) -> Arc<DocumentStore> {
        let store = Arc::new(DocumentStore::new());
        let docs = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document::new(format!("d{}", i), *t, SourceMetadata::new("test.txt")))
            .collect();
        store.rebuild(docs, &[provider]).await.unwrap();
        store
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        fn id(&self) -> &str {
            "local"
        }

        fn model(&self) -> &str {
            "slow"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> EmbeddingResult<EmbeddingVector> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(EmbeddingVector::new("local", vec![1.0, 0.0]))
        }
    }

    #[tokio::test]
    async fn test_similarity_returns_best_first() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new("local", 128));
        let store = store_with(
            provider.clone(),
            &["the one ring of power", "hobbits eat second breakfast", "elves of rivendell"],
        )
        .await;
        let retriever = Retriever::new(config(SearchType::Similarity), provider, store, Duration::from_secs(1));

        let result = retriever.retrieve("the one ring", 2).await.unwrap();
        assert_eq!(result.retriever, "test-retriever");
        assert_eq!(result.len(), 2);
        assert_eq!(result.hits[0].document.id, "d0");
        assert!(result.hits[0].score >= result.hits[1].score);
    }

    #[tokio::test]
    async fn test_k_larger_than_corpus() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new("local", 64));
        let store = store_with(provider.clone(), &["mordor", "gondor"]).await;
        let retriever = Retriever::new(config(SearchType::Mmr), provider, store, Duration::from_secs(1));

        let result = retriever.retrieve("rohan", 10).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new("local", 64));
        let store = store_with(provider.clone(), &["mordor"]).await;
        let retriever = Retriever::new(config(SearchType::Similarity), provider, store, Duration::from_secs(1));

        assert!(matches!(
            retriever.retrieve("rohan", 0).await,
            Err(RetrieverError::InvalidK { k: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_index() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new("local", 64));
        let store = Arc::new(DocumentStore::new());
        let retriever = Retriever::new(config(SearchType::Similarity), provider, store, Duration::from_secs(1));

        assert!(matches!(
            retriever.retrieve("rohan", 1).await,
            Err(RetrieverError::MissingIndex { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_query_is_embedding_error() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new("local", 64));
        let store = store_with(provider.clone(), &["mordor"]).await;
        let retriever = Retriever::new(config(SearchType::Similarity), provider, store, Duration::from_secs(1));

        match retriever.retrieve("   ", 1).await {
            Err(RetrieverError::Embedding { retriever, source }) => {
                assert_eq!(retriever, "test-retriever");
                assert!(source.is_invalid_input());
            }
            other => panic!("expected embedding error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[tokio::test]
    async fn test_embed_timeout() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(SlowProvider);
        let store = Arc::new(DocumentStore::new());
        let docs = vec![Document::new("d0", "text", SourceMetadata::new("t"))];
        docs[0].cache_embedding("local", vec![1.0, 0.0]);
        store.rebuild(docs, &[provider.clone()]).await.unwrap();

        let retriever = Retriever::new(config(SearchType::Similarity), provider, store, Duration::from_millis(20));
        assert!(matches!(
            retriever.retrieve("query", 1).await,
            Err(RetrieverError::Timeout { timeout_ms: 20, .. })
        ));
    }

    #[test]
    fn test_mmr_prefers_diverse_candidates() {
        let query = [1.0f32, 0.0];
        let a = [0.8f32, 0.6];
        let a_dup = [0.78f32, 0.62];
        let b = [0.6f32, -0.8];
        let picks = maximal_marginal_relevance(&query, &[&a[..], &a_dup[..], &b[..]], 2, 0.5);
        assert_eq!(picks, vec![0, 2]);
    }

    #[test]
    fn test_mmr_lambda_one_is_relevance_order() {
        let query = [1.0f32, 0.0];
        let a = [0.8f32, 0.6];
        let a_dup = [0.78f32, 0.62];
        let b = [0.6f32, -0.8];
        let picks = maximal_marginal_relevance(&query, &[&a[..], &a_dup[..], &b[..]], 3, 1.0);
        assert_eq!(picks, vec![0, 1, 2]);
    }

    #[test]
    fn test_mmr_ties_keep_candidate_order() {
        let query = [1.0f32, 0.0];
        let a = [0.0f32, 1.0];
        let b = [0.0f32, 1.0];
        let picks = maximal_marginal_relevance(&query, &[&a[..], &b[..]], 2, 0.5);
        assert_eq!(picks, vec![0, 1]);
    }
}
