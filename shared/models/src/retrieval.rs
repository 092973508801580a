use serde::Serialize;
use std::sync::Arc;

use crate::document::Document;

/// A document paired with its relevance (higher = more relevant)
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Arc<Document>,
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(document: Arc<Document>, score: f32) -> Self {
        Self { document, score }
    }
}

/// Ranked output of one retriever for one query, best first
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub retriever: String,
    pub hits: Vec<ScoredDocument>,
}

impl RetrievalResult {
    pub fn new(retriever: impl Into<String>, hits: Vec<ScoredDocument>) -> Self {
        Self {
            retriever: retriever.into(),
            hits,
        }
    }

    /// Placeholder contribution for a retriever that failed in partial-results mode
    pub fn empty(retriever: impl Into<String>) -> Self {
        Self::new(retriever, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.hits.iter().map(|hit| &hit.document)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.document.id.as_str()).collect()
    }
}
