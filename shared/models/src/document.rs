use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a chunk came from inside its source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Path or URI of the ingested source
    pub source: String,
    /// 1-based page number, when the source is paginated
    pub page: Option<u32>,
    /// Position of the chunk within its page (or source when unpaginated)
    pub chunk_index: u32,
    /// Byte offsets of the chunk inside the page text
    pub start_offset: Option<usize>,
    pub end_offset: Option<usize>,
    /// Free-form attributes carried through to the caller
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl SourceMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_chunk_index(mut self, chunk_index: u32) -> Self {
        self.chunk_index = chunk_index;
        self
    }

    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.start_offset = Some(start);
        self.end_offset = Some(end);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A chunk of source text.
///
/// The id, text and metadata never change after construction. The embedding
/// cache is filled lazily, once per provider, and only ever grows.
#[derive(Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source_metadata: SourceMetadata,
    #[serde(skip)]
    embedding_cache: RwLock<HashMap<String, Arc<[f32]>>>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_metadata: SourceMetadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_metadata,
            embedding_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Stable id for a chunk: UUIDv5 over `source:page:chunk`
    pub fn stable_id(source: &str, page: Option<u32>, chunk_index: u32) -> String {
        let name = format!("{}:{}:{}", source, page.unwrap_or(0), chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Previously computed vector for `provider`, if any
    pub fn cached_embedding(&self, provider: &str) -> Option<Arc<[f32]>> {
        self.embedding_cache.read().get(provider).cloned()
    }

    /// Stores the vector for `provider` and returns the cached copy.
    ///
    /// The first writer wins so concurrent callers all observe the same vector.
    pub fn cache_embedding(&self, provider: &str, vector: Vec<f32>) -> Arc<[f32]> {
        let mut cache = self.embedding_cache.write();
        cache
            .entry(provider.to_string())
            .or_insert_with(|| Arc::from(vector))
            .clone()
    }

    pub fn cached_providers(&self) -> Vec<String> {
        let mut providers: Vec<String> = self.embedding_cache.read().keys().cloned().collect();
        providers.sort();
        providers
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("source_metadata", &self.source_metadata)
            .field("cached_providers", &self.cached_providers())
            .finish()
    }
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            text: self.text.clone(),
            source_metadata: self.source_metadata.clone(),
            embedding_cache: RwLock::new(self.embedding_cache.read().clone()),
        }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.text == other.text && self.source_metadata == other.source_metadata
    }
}

impl Eq for Document {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_id_is_deterministic() {
        let a = Document::stable_id("book.txt", Some(3), 1);
        let b = Document::stable_id("book.txt", Some(3), 1);
        let c = Document::stable_id("book.txt", Some(3), 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_embedding_cache_first_writer_wins() {
        let doc = Document::new("a", "alpha", SourceMetadata::new("mem"));
        assert!(doc.cached_embedding("hashing").is_none());

        let first = doc.cache_embedding("hashing", vec![1.0, 0.0]);
        let second = doc.cache_embedding("hashing", vec![0.0, 1.0]);

        assert_eq!(&*first, &[1.0, 0.0]);
        assert_eq!(&*second, &[1.0, 0.0]);
        assert_eq!(doc.cached_providers(), vec!["hashing".to_string()]);
    }

    #[test]
    fn test_equality_ignores_cache() {
        let a = Document::new("a", "alpha", SourceMetadata::new("mem").with_page(1));
        let b = a.clone();
        a.cache_embedding("p", vec![0.5]);

        assert_eq!(a, b);
    }

    #[test]
    fn test_serialization_skips_cache() {
        let doc = Document::new("a", "alpha", SourceMetadata::new("mem").with_extra("lang", "en"));
        doc.cache_embedding("p", vec![0.5]);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["source_metadata"]["extra"]["lang"], "en");
        assert!(json.get("embedding_cache").is_none());
    }
}
