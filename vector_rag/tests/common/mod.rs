#![allow(dead_code)]

use async_trait::async_trait;
use embedding::{EmbeddingError, EmbeddingProvider, EmbeddingResult, EmbeddingVector, HashingEmbeddingProvider};
use lotr_models::{Document, SourceMetadata};
use std::collections::HashMap;
use std::sync::Arc;

pub fn doc(id: &str, text: &str) -> Document {
    Document::new(id, text, SourceMetadata::new("fellowship.txt"))
}

pub fn shared_doc(id: &str, text: &str) -> Arc<Document> {
    Arc::new(doc(id, text))
}

pub fn ids(docs: &[Arc<Document>]) -> Vec<String> {
    docs.iter().map(|d| d.id.clone()).collect()
}

/// Twelve passages in three clearly separated topics
pub fn fellowship_corpus() -> Vec<Document> {
    [
        ("ring-1", "The One Ring was forged by Sauron in the fires of Mount Doom"),
        ("shire-1", "Hobbits of the Shire enjoy second breakfast and pipe weed"),
        ("rohan-1", "The Rohirrim ride swift horses across the plains of Rohan"),
        ("ring-2", "Frodo carried the Ring toward Mount Doom to destroy it"),
        ("shire-2", "Bilbo threw a birthday party for the hobbits of Hobbiton"),
        ("rohan-2", "Theoden king of Rohan led his riders to Helms Deep"),
        ("ring-3", "Isildur cut the Ring from the hand of Sauron"),
        ("shire-3", "Samwise tended the gardens of Bag End in the Shire"),
        ("rohan-3", "Eomer and the horse lords of Rohan guard the Riddermark"),
        ("ring-4", "Gollum called the Ring his precious and hid under the mountains"),
        ("shire-4", "The Green Dragon inn in the Shire served hobbits fine ale"),
        ("rohan-4", "Shadowfax was the chief of the horses of Rohan"),
    ]
    .iter()
    .map(|(id, text)| doc(id, text))
    .collect()
}

/// Provider that returns fixed vectors looked up by document text
pub struct TableProvider {
    id: String,
    table: HashMap<String, Vec<f32>>,
}

impl TableProvider {
    pub fn new(id: &str, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            id: id.to_string(),
            table: entries.iter().map(|(text, v)| (text.to_string(), v.clone())).collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        "table"
    }

    fn dimension(&self) -> usize {
        self.table.values().next().map(Vec::len).unwrap_or(0)
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        self.table
            .get(text)
            .map(|v| EmbeddingVector::new(self.id.clone(), v.clone()))
            .ok_or_else(|| EmbeddingError::malformed(&self.id, format!("no vector for '{}'", text)))
    }
}

/// Indexes documents like a hashing provider but rejects every query
pub struct QueryFailingProvider {
    inner: HashingEmbeddingProvider,
}

impl QueryFailingProvider {
    pub fn new(id: &str) -> Self {
        Self {
            inner: HashingEmbeddingProvider::new(id, 64),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for QueryFailingProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn model(&self) -> &str {
        "query-failing"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, _text: &str) -> EmbeddingResult<EmbeddingVector> {
        Err(EmbeddingError::Api {
            provider: self.inner.id().to_string(),
            status: 503,
            message: "model is loading".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        self.inner.embed_batch(texts).await
    }
}

/// Two hashing retrievers over the same corpus, redundancy-filtered
pub const HASHING_PIPELINE_JSON: &str = r#"{
    "providers": [
        { "id": "words", "kind": "hashing", "model": "feature-hashing", "dimension": 256, "cache_capacity": 0 },
        { "id": "words-small", "kind": "hashing", "model": "feature-hashing", "dimension": 64 }
    ],
    "retrievers": [
        { "id": "words-similarity", "provider": "words", "search_type": "similarity", "k": 4 },
        { "id": "words-mmr", "provider": "words-small", "search_type": "mmr", "k": 4, "fetch_k": 8, "metric": "inner_product" }
    ],
    "reduction_provider": "words",
    "reduction": { "strategy": "redundancy-filter", "similarity_threshold": 0.95 },
    "reorder": true
}"#;
