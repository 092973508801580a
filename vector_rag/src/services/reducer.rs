use embedding::{EmbeddingError, EmbeddingProvider, VectorOps};
use lotr_config::ReductionConfig;
use lotr_models::Document;
use lotr_observability::{log_clamped, log_reduction_completed, log_timed};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::ReductionError;
use crate::services::kmeans::KMeans;

/// Embeds documents with the reduction provider, reusing and filling each
/// document's cache. Output row `i` belongs to `documents[i]`. Uncached
/// documents are embedded once per distinct (id, text) pair.
async fn embed_documents(
    provider: &dyn EmbeddingProvider,
    documents: &[Arc<Document>],
    timeout: Duration,
) -> Result<Vec<Arc<[f32]>>, ReductionError> {
    let provider_id = provider.id();
    let embedding_error = |source: EmbeddingError| ReductionError::Embedding {
        provider: provider_id.to_string(),
        source,
    };

    let mut seen = HashSet::new();
    let missing: Vec<&Arc<Document>> = documents
        .iter()
        .filter(|doc| doc.cached_embedding(provider_id).is_none())
        .filter(|doc| seen.insert(content_key(*doc)))
        .collect();

    let mut fresh: HashMap<(&str, &str), Arc<[f32]>> = HashMap::with_capacity(missing.len());
    if !missing.is_empty() {
        let texts: Vec<String> = missing.iter().map(|doc| doc.text.clone()).collect();
        let vectors = match tokio::time::timeout(timeout, provider.embed_batch(&texts)).await {
            Ok(result) => result.map_err(embedding_error)?,
            Err(_) => {
                return Err(embedding_error(EmbeddingError::Timeout {
                    provider: provider_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }))
            }
        };

        if vectors.len() != missing.len() {
            return Err(embedding_error(EmbeddingError::malformed(
                provider_id,
                format!("expected {} vectors, got {}", missing.len(), vectors.len()),
            )));
        }

        for (doc, vector) in missing.iter().zip(vectors) {
            let cached = doc.cache_embedding(provider_id, vector.values().to_vec());
            fresh.insert(content_key(*doc), cached);
        }
        debug!(provider = provider_id, embedded = fresh.len(), "Embedded documents for reduction");
    }

    documents
        .iter()
        .map(|doc| {
            doc.cached_embedding(provider_id)
                .or_else(|| fresh.get(&content_key(doc)).cloned())
                .ok_or_else(|| embedding_error(EmbeddingError::malformed(provider_id, "missing document vector")))
        })
        .collect()
}

fn content_key(doc: &Document) -> (&str, &str) {
    (doc.id.as_str(), doc.text.as_str())
}

/// Drops documents that repeat a kept id or are too similar to a kept document
pub struct RedundancyFilter {
    provider: Arc<dyn EmbeddingProvider>,
    similarity_threshold: f32,
    timeout: Duration,
}

impl RedundancyFilter {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        similarity_threshold: f32,
        timeout: Duration,
    ) -> Result<Self, ReductionError> {
        if !similarity_threshold.is_finite() || !(-1.0..=1.0).contains(&similarity_threshold) {
            return Err(ReductionError::InvalidThreshold(similarity_threshold));
        }
        Ok(Self {
            provider,
            similarity_threshold,
            timeout,
        })
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    pub async fn reduce(&self, documents: Vec<Arc<Document>>) -> Result<Vec<Arc<Document>>, ReductionError> {
        if documents.is_empty() {
            return Ok(documents);
        }

        let vectors = embed_documents(self.provider.as_ref(), &documents, self.timeout).await?;
        let mut kept: Vec<usize> = Vec::with_capacity(documents.len());
        let mut kept_ids: HashSet<&str> = HashSet::with_capacity(documents.len());

        for (i, doc) in documents.iter().enumerate() {
            if kept_ids.contains(doc.id.as_str()) {
                continue;
            }
            let redundant = kept
                .iter()
                .any(|&j| VectorOps::cosine_similarity(&vectors[i], &vectors[j]) > self.similarity_threshold);
            if !redundant {
                kept.push(i);
                kept_ids.insert(doc.id.as_str());
            }
        }

        Ok(kept.into_iter().map(|i| Arc::clone(&documents[i])).collect())
    }
}

/// One K-means group of the reduced input
#[derive(Debug, Clone)]
pub struct Cluster {
    pub label: usize,
    /// Positions in the input sequence, ascending
    pub member_indices: Vec<usize>,
    pub members: Vec<Arc<Document>>,
    pub centroid: Vec<f32>,
    pub representative_indices: Vec<usize>,
    pub representatives: Vec<Arc<Document>>,
}

/// Keeps the `num_closest` most central documents of each of `num_clusters` clusters
pub struct ClusteringFilter {
    provider: Arc<dyn EmbeddingProvider>,
    num_clusters: usize,
    num_closest: usize,
    sorted: bool,
    seed: u64,
    timeout: Duration,
}

impl ClusteringFilter {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        num_clusters: usize,
        num_closest: usize,
        sorted: bool,
        seed: u64,
        timeout: Duration,
    ) -> Result<Self, ReductionError> {
        if num_clusters == 0 {
            return Err(ReductionError::InvalidClusterCount(num_clusters));
        }
        if num_closest == 0 {
            return Err(ReductionError::InvalidClosestCount(num_closest));
        }
        Ok(Self {
            provider,
            num_clusters,
            num_closest,
            sorted,
            seed,
            timeout,
        })
    }

    /// Partition `documents` and pick representatives for every cluster
    pub async fn clusters(&self, documents: &[Arc<Document>]) -> Result<Vec<Cluster>, ReductionError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = embed_documents(self.provider.as_ref(), documents, self.timeout).await?;

        let k = self.num_clusters.min(documents.len());
        if k < self.num_clusters {
            log_clamped!("num_clusters", self.num_clusters, k);
        }

        let points: Vec<&[f32]> = vectors.iter().map(|v| &v[..]).collect();
        let fit = log_timed!("kmeans_fit", KMeans::new(k, self.seed).fit(&points));
        debug!(
            clusters = fit.num_clusters(),
            iterations = fit.iterations,
            "K-means converged"
        );

        let mut selected_ids: HashSet<&str> = HashSet::new();
        let mut clusters = Vec::with_capacity(fit.num_clusters());

        for (label, centroid) in fit.centroids.iter().enumerate() {
            let member_indices = fit.members(label);

            let mut by_distance: Vec<(usize, f32)> = member_indices
                .iter()
                .map(|&i| (i, VectorOps::euclidean_distance(&vectors[i], centroid)))
                .collect();
            by_distance.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            let mut representative_indices = Vec::with_capacity(self.num_closest);
            for (i, _) in by_distance {
                if representative_indices.len() == self.num_closest {
                    break;
                }
                if selected_ids.insert(documents[i].id.as_str()) {
                    representative_indices.push(i);
                }
            }

            clusters.push(Cluster {
                label,
                members: member_indices.iter().map(|&i| Arc::clone(&documents[i])).collect(),
                member_indices,
                centroid: centroid.clone(),
                representatives: representative_indices.iter().map(|&i| Arc::clone(&documents[i])).collect(),
                representative_indices,
            });
        }

        Ok(clusters)
    }

    pub async fn reduce(&self, documents: Vec<Arc<Document>>) -> Result<Vec<Arc<Document>>, ReductionError> {
        let clusters = self.clusters(&documents).await?;

        let mut picks: Vec<usize> = clusters
            .iter()
            .flat_map(|c| c.representative_indices.iter().copied())
            .collect();
        if self.sorted {
            picks.sort_unstable();
        }

        Ok(picks.into_iter().map(|i| Arc::clone(&documents[i])).collect())
    }
}

/// The configured reduction strategy
pub enum Reducer {
    Redundancy(RedundancyFilter),
    Clustering(ClusteringFilter),
}

impl Reducer {
    pub fn from_config(
        config: &ReductionConfig,
        provider: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Result<Self, ReductionError> {
        match config {
            ReductionConfig::RedundancyFilter { similarity_threshold } => Ok(Reducer::Redundancy(
                RedundancyFilter::new(provider, *similarity_threshold, timeout)?,
            )),
            ReductionConfig::ClusteringFilter {
                num_clusters,
                num_closest,
                sorted,
                seed,
            } => Ok(Reducer::Clustering(ClusteringFilter::new(
                provider,
                *num_clusters,
                *num_closest,
                *sorted,
                *seed,
                timeout,
            )?)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Redundancy(_) => "redundancy-filter",
            Reducer::Clustering(_) => "clustering-filter",
        }
    }

    pub async fn reduce(&self, documents: Vec<Arc<Document>>) -> Result<Vec<Arc<Document>>, ReductionError> {
        let start = Instant::now();
        let input = documents.len();

        let reduced = match self {
            Reducer::Redundancy(filter) => filter.reduce(documents).await?,
            Reducer::Clustering(filter) => filter.reduce(documents).await?,
        };

        log_reduction_completed(self.name(), input, reduced.len(), start.elapsed().as_millis() as u64);
        Ok(reduced)
    }
}
