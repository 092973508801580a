use async_trait::async_trait;
use lotr_observability::log_cache;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::EmbeddingProvider;
use crate::vector::EmbeddingVector;

/// Bounded LRU map of (provider id, text hash) to vector. A capacity of 0
/// disables storage while still counting lookups.
pub struct EmbeddingCache {
    entries: Option<Mutex<LruCache<String, EmbeddingVector>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn key(provider: &str, text: &str) -> String {
        format!("{}:{}", provider, hex::encode(Sha256::digest(text.as_bytes())))
    }

    pub fn get(&self, key: &str) -> Option<EmbeddingVector> {
        let found = self
            .entries
            .as_ref()
            .and_then(|entries| entries.lock().get(key).cloned());
        match found {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log_cache!(hit, key);
                Some(vector)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log_cache!(miss, key);
                None
            }
        }
    }

    pub fn insert(&self, key: String, vector: EmbeddingVector) {
        let Some(entries) = &self.entries else {
            return;
        };

        // push hands back the replaced entry for an existing key, otherwise the evicted one
        if let Some((old_key, _)) = entries.lock().push(key.clone(), vector) {
            if old_key != key {
                log_cache!(evict, old_key.as_str());
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.as_ref().map_or(0, |entries| entries.lock().len()),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Provider decorator that answers repeated texts from an [`EmbeddingCache`]
pub struct CachedProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        let key = EmbeddingCache::key(self.inner.id(), text);
        if let Some(vector) = self.cache.get(&key) {
            return Ok(vector);
        }

        let vector = self.inner.embed(text).await?;
        self.cache.insert(key, vector.clone());
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| EmbeddingCache::key(self.inner.id(), t))
            .collect();

        let mut results: Vec<Option<EmbeddingVector>> = keys.iter().map(|k| self.cache.get(k)).collect();
        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fetched = self.inner.embed_batch(&batch).await?;
            if fetched.len() != batch.len() {
                return Err(EmbeddingError::malformed(
                    self.inner.id(),
                    format!("expected {} vectors, got {}", batch.len(), fetched.len()),
                ));
            }
            for (&index, vector) in missing.iter().zip(fetched) {
                self.cache.insert(keys[index].clone(), vector.clone());
                results[index] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HashingEmbeddingProvider;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        inner: HashingEmbeddingProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn id(&self) -> &str {
            self.inner.id()
        }
        fn model(&self) -> &str {
            self.inner.model()
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }
    }

    fn counting() -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            inner: HashingEmbeddingProvider::new("local", 16),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let inner = counting();
        let cached = CachedProvider::new(inner.clone(), 10);

        let a = cached.embed("gandalf").await.unwrap();
        let b = cached.embed("gandalf").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cache().stats(), CacheStats { entries: 1, hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_batch_only_fetches_misses_in_order() {
        let inner = counting();
        let cached = CachedProvider::new(inner.clone(), 10);
        cached.embed("b").await.unwrap();

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        let direct = HashingEmbeddingProvider::new("local", 16);
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &direct.embed(text).await.unwrap());
        }
    }

    #[test]
    fn test_least_recently_used_entry_evicted() {
        let cache = EmbeddingCache::new(2);
        cache.insert("k1".to_string(), EmbeddingVector::new("p", vec![1.0]));
        cache.insert("k2".to_string(), EmbeddingVector::new("p", vec![2.0]));
        cache.insert("k3".to_string(), EmbeddingVector::new("p", vec![3.0]));

        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_recently_read_entry_survives_eviction() {
        let cache = EmbeddingCache::new(2);
        cache.insert("hot".to_string(), EmbeddingVector::new("p", vec![1.0]));
        cache.insert("cold".to_string(), EmbeddingVector::new("p", vec![2.0]));
        for _ in 0..5 {
            assert!(cache.get("hot").is_some());
        }
        cache.insert("new".to_string(), EmbeddingVector::new("p", vec![3.0]));

        assert!(cache.get("hot").is_some());
        assert!(cache.get("cold").is_none());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_reinsert_replaces_value_without_growing() {
        let cache = EmbeddingCache::new(2);
        cache.insert("k".to_string(), EmbeddingVector::new("p", vec![1.0]));
        cache.insert("k".to_string(), EmbeddingVector::new("p", vec![2.0]));

        assert_eq!(cache.get("k").unwrap().values().to_vec(), vec![2.0]);
        assert_eq!(cache.stats().entries, 1);
    }

    /// Drops the last vector of every batch
    struct ShortBatchProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortBatchProvider {
        fn id(&self) -> &str {
            "short"
        }
        fn model(&self) -> &str {
            "short"
        }
        fn dimension(&self) -> usize {
            1
        }
        async fn embed(&self, _text: &str) -> EmbeddingResult<EmbeddingVector> {
            Ok(EmbeddingVector::new("short", vec![1.0]))
        }
        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
            Ok(texts
                .iter()
                .skip(1)
                .map(|_| EmbeddingVector::new("short", vec![1.0]))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_short_inner_batch_is_malformed() {
        let cached = CachedProvider::new(Arc::new(ShortBatchProvider), 10);
        let texts = vec!["a".to_string(), "b".to_string()];

        let result = cached.embed_batch(&texts).await;
        assert!(matches!(result, Err(EmbeddingError::MalformedResponse { .. })));
        assert_eq!(cached.cache().stats().entries, 0);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = EmbeddingCache::new(0);
        cache.insert("k".to_string(), EmbeddingVector::new("p", vec![1.0]));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_key_is_provider_scoped() {
        assert_ne!(EmbeddingCache::key("a", "text"), EmbeddingCache::key("b", "text"));
        assert_eq!(EmbeddingCache::key("a", "text"), EmbeddingCache::key("a", "text"));
    }
}
