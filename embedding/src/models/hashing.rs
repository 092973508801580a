use async_trait::async_trait;
use lotr_config::ProviderConfig;
use sha2::{Digest, Sha256};

use crate::error::EmbeddingResult;
use crate::provider::{check_input, EmbeddingProvider};
use crate::vector::{EmbeddingVector, VectorOps};

pub const DEFAULT_HASHING_DIMENSION: usize = 256;

/// Offline feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets with a hash-derived sign, and the result is
/// L2-normalised. Texts sharing vocabulary get high cosine similarity, which
/// is enough to exercise retrieval and reduction without a model server.
pub struct HashingEmbeddingProvider {
    id: String,
    model: String,
    dimension: usize,
    max_input_chars: usize,
}

impl HashingEmbeddingProvider {
    pub fn new(id: impl Into<String>, dimension: usize) -> Self {
        Self {
            id: id.into(),
            model: format!("hashing-{}", dimension),
            dimension: dimension.max(1),
            max_input_chars: usize::MAX,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            model: config.model.clone(),
            dimension: config.dimension.unwrap_or(DEFAULT_HASHING_DIMENSION).max(1),
            max_input_chars: config.max_input_chars,
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        if tokens.is_empty() {
            // Punctuation-only input still gets a stable non-zero vector
            vec![text.trim().to_string()]
        } else {
            tokens
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in Self::tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        VectorOps::normalize(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<EmbeddingVector> {
        check_input(&self.id, text, self.max_input_chars)?;
        Ok(EmbeddingVector::new(self.id.clone(), self.vectorize(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;

    #[tokio::test]
    async fn test_deterministic() {
        let provider = HashingEmbeddingProvider::new("local", 64);
        let a = provider.embed("The ring was forged in Mordor").await.unwrap();
        let b = provider.embed("The ring was forged in Mordor").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimension(), 64);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let provider = HashingEmbeddingProvider::new("local", 32);
        let v = provider.embed("one two three four").await.unwrap();
        assert!((VectorOps::norm(v.values()) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_case_and_punctuation_insensitive() {
        let provider = HashingEmbeddingProvider::new("local", 128);
        let a = provider.embed("Frodo carries the ring.").await.unwrap();
        let b = provider.embed("frodo, CARRIES the ring").await.unwrap();
        assert!((a.cosine_similarity(&b).unwrap() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = HashingEmbeddingProvider::new("local", 512);
        let query = provider.embed("hobbits live in the shire").await.unwrap();
        let near = provider.embed("the shire is where hobbits live").await.unwrap();
        let far = provider.embed("orcs march from isengard at night").await.unwrap();

        assert!(query.cosine_similarity(&near).unwrap() > query.cosine_similarity(&far).unwrap());
    }

    #[tokio::test]
    async fn test_empty_rejected() {
        let provider = HashingEmbeddingProvider::new("local", 8);
        assert!(matches!(provider.embed("").await, Err(EmbeddingError::EmptyInput { .. })));
    }

    #[tokio::test]
    async fn test_punctuation_only_is_non_zero() {
        let provider = HashingEmbeddingProvider::new("local", 8);
        let v = provider.embed("?!").await.unwrap();
        assert!(VectorOps::norm(v.values()) > 0.0);
    }
}
