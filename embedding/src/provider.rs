use async_trait::async_trait;

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::vector::EmbeddingVector;

/// Text to vector capability. Implementations must be deterministic for a
/// fixed model version and must not read credentials from the environment.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider id from configuration; tags every produced vector
    fn id(&self) -> &str;

    fn model(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingVector>;

    /// Embed several texts, output order matches input order
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Reject empty and oversized input before any work is done
pub fn check_input(provider: &str, text: &str, max_chars: usize) -> EmbeddingResult<()> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput {
            provider: provider.to_string(),
        });
    }

    let chars = text.chars().count();
    if chars > max_chars {
        return Err(EmbeddingError::InputTooLong {
            provider: provider.to_string(),
            chars,
            max: max_chars,
        });
    }

    Ok(())
}

/// Verify a provider response before it is tagged
pub(crate) fn check_dimension(provider: &str, expected: usize, values: &[f32]) -> EmbeddingResult<()> {
    if values.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            provider: provider.to_string(),
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}
