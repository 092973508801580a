use embedding::{EmbeddingProvider, VectorOps};
use lotr_config::DistanceMetric;
use lotr_models::Document;
use lotr_observability::log_index_built;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::StoreError;

/// Document vectors for one provider, row `i` belongs to `documents[i]`
#[derive(Debug, Clone)]
pub struct VectorIndex {
    provider: String,
    dimension: usize,
    vectors: Vec<Arc<[f32]>>,
}

impl VectorIndex {
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vector(&self, index: usize) -> Option<&Arc<[f32]>> {
        self.vectors.get(index)
    }

    /// Top `n` rows by relevance under `metric`, best first, ties by row order
    pub fn nearest(&self, query: &[f32], n: usize, metric: DistanceMetric) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, relevance(metric, query, v)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(n);
        scored
    }
}

/// Higher is more relevant for every metric
pub fn relevance(metric: DistanceMetric, query: &[f32], vector: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => VectorOps::cosine_similarity(query, vector),
        DistanceMetric::L2 => 1.0 - VectorOps::euclidean_distance(query, vector) / std::f32::consts::SQRT_2,
        DistanceMetric::InnerProduct => VectorOps::dot(query, vector),
    }
}

/// Immutable view of the corpus and its per-provider indexes
#[derive(Debug, Default)]
pub struct StoreSnapshot {
    pub version: u64,
    documents: Vec<Arc<Document>>,
    indexes: HashMap<String, VectorIndex>,
}

impl StoreSnapshot {
    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn document(&self, index: usize) -> Option<&Arc<Document>> {
        self.documents.get(index)
    }

    pub fn index(&self, provider: &str) -> Option<&VectorIndex> {
        self.indexes.get(provider)
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.indexes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Corpus store shared by every retriever.
///
/// Readers clone the current snapshot `Arc` and never block on a rebuild.
/// Rebuilds are serialized and publish a new snapshot atomically.
pub struct DocumentStore {
    current: RwLock<Arc<StoreSnapshot>>,
    writer: Mutex<()>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(StoreSnapshot::default())),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Embed `documents` with every provider and publish them as the new corpus
    pub async fn rebuild(
        &self,
        documents: Vec<Document>,
        providers: &[Arc<dyn EmbeddingProvider>],
    ) -> Result<Arc<StoreSnapshot>, StoreError> {
        let _guard = self.writer.lock().await;

        let mut seen = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(StoreError::DuplicateId(doc.id.clone()));
            }
        }

        let documents: Vec<Arc<Document>> = documents.into_iter().map(Arc::new).collect();
        let mut indexes = HashMap::with_capacity(providers.len());

        for provider in providers {
            let index = build_index(&documents, provider.as_ref()).await?;
            indexes.insert(provider.id().to_string(), index);
        }

        let version = self.current.read().version + 1;
        let snapshot = Arc::new(StoreSnapshot {
            version,
            documents,
            indexes,
        });
        *self.current.write() = Arc::clone(&snapshot);

        info!(
            version,
            documents = snapshot.len(),
            providers = ?snapshot.providers(),
            "Published document store snapshot"
        );
        Ok(snapshot)
    }
}

async fn build_index(
    documents: &[Arc<Document>],
    provider: &dyn EmbeddingProvider,
) -> Result<VectorIndex, StoreError> {
    let start = Instant::now();
    let provider_id = provider.id().to_string();

    let missing: Vec<usize> = documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| doc.cached_embedding(&provider_id).is_none())
        .map(|(i, _)| i)
        .collect();

    if !missing.is_empty() {
        let texts: Vec<String> = missing.iter().map(|&i| documents[i].text.clone()).collect();
        let vectors = provider
            .embed_batch(&texts)
            .await
            .map_err(|source| StoreError::Embedding {
                provider: provider_id.clone(),
                source,
            })?;

        for (&i, vector) in missing.iter().zip(vectors) {
            documents[i].cache_embedding(&provider_id, vector.values().to_vec());
        }
    }

    let mut vectors = Vec::with_capacity(documents.len());
    for doc in documents {
        match doc.cached_embedding(&provider_id) {
            Some(vector) => vectors.push(vector),
            None => {
                return Err(StoreError::Embedding {
                    provider: provider_id.clone(),
                    source: embedding::EmbeddingError::malformed(&provider_id, "batch returned too few vectors"),
                })
            }
        }
    }

    log_index_built(&provider_id, documents.len(), start.elapsed().as_millis() as u64);

    Ok(VectorIndex {
        provider: provider_id,
        dimension: provider.dimension(),
        vectors,
    })
}
