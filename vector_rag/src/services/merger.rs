use lotr_models::{Document, RetrievalResult};
use std::sync::Arc;

use crate::errors::MergeError;

/// Round-robin interleave of retriever results.
///
/// Takes the first hit of every result in order, then the second, and so on.
/// Each retriever's own order is preserved and nothing is deduplicated.
pub fn merge(results: &[RetrievalResult]) -> Result<Vec<Arc<Document>>, MergeError> {
    if results.is_empty() {
        return Err(MergeError::NoRetrievers);
    }

    let longest = results.iter().map(RetrievalResult::len).max().unwrap_or(0);
    let total = results.iter().map(RetrievalResult::len).sum();
    let mut merged = Vec::with_capacity(total);

    for rank in 0..longest {
        for result in results {
            if let Some(hit) = result.hits.get(rank) {
                merged.push(Arc::clone(&hit.document));
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotr_models::{ScoredDocument, SourceMetadata};

    fn result(retriever: &str, ids: &[&str]) -> RetrievalResult {
        let hits = ids
            .iter()
            .map(|id| {
                let doc = Arc::new(Document::new(*id, format!("text {}", id), SourceMetadata::new("t")));
                ScoredDocument::new(doc, 1.0)
            })
            .collect();
        RetrievalResult::new(retriever, hits)
    }

    fn ids(docs: &[Arc<Document>]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_interleaves_in_rank_order() {
        let merged = merge(&[result("r1", &["A", "B", "C"]), result("r2", &["B", "D", "E"])]).unwrap();
        assert_eq!(ids(&merged), vec!["A", "B", "B", "D", "C", "E"]);
    }

    #[test]
    fn test_uneven_lengths() {
        let merged = merge(&[
            result("r1", &["A"]),
            result("r2", &["B", "C", "D"]),
            result("r3", &[]),
        ])
        .unwrap();
        assert_eq!(ids(&merged), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_all_empty_results_merge_to_nothing() {
        let merged = merge(&[result("r1", &[]), result("r2", &[])]).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn test_no_retrievers() {
        assert!(matches!(merge(&[]), Err(MergeError::NoRetrievers)));
    }
}
