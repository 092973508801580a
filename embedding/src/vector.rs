use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{EmbeddingError, EmbeddingResult};

/// A vector produced by one provider. Vectors are only comparable with
/// vectors of the same provider and dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingVector {
    provider: String,
    values: Arc<[f32]>,
}

impl EmbeddingVector {
    pub fn new(provider: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            provider: provider.into(),
            values: values.into(),
        }
    }

    pub fn from_shared(provider: impl Into<String>, values: Arc<[f32]>) -> Self {
        Self {
            provider: provider.into(),
            values,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn shared(&self) -> Arc<[f32]> {
        Arc::clone(&self.values)
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    fn ensure_compatible(&self, other: &Self) -> EmbeddingResult<()> {
        if self.provider != other.provider || self.values.len() != other.values.len() {
            return Err(EmbeddingError::IncompatibleVectors {
                left: self.provider.clone(),
                left_dim: self.values.len(),
                right: other.provider.clone(),
                right_dim: other.values.len(),
            });
        }
        Ok(())
    }

    pub fn cosine_similarity(&self, other: &Self) -> EmbeddingResult<f32> {
        self.ensure_compatible(other)?;
        Ok(VectorOps::cosine_similarity(&self.values, &other.values))
    }

    pub fn dot(&self, other: &Self) -> EmbeddingResult<f32> {
        self.ensure_compatible(other)?;
        Ok(VectorOps::dot(&self.values, &other.values))
    }

    pub fn euclidean_distance(&self, other: &Self) -> EmbeddingResult<f32> {
        self.ensure_compatible(other)?;
        Ok(VectorOps::euclidean_distance(&self.values, &other.values))
    }
}

/// Slice-level vector math. Callers guarantee equal lengths.
pub struct VectorOps;

impl VectorOps {
    pub fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    pub fn norm(a: &[f32]) -> f32 {
        Self::dot(a, a).sqrt()
    }

    /// Cosine similarity clamped to [-1, 1]; 0.0 when either side is the zero vector
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let (dot, norm_a_sq, norm_b_sq) = a
            .iter()
            .zip(b)
            .fold((0.0f32, 0.0f32, 0.0f32), |(d, na, nb), (x, y)| {
                (d + x * y, na + x * x, nb + y * y)
            });

        let norm_a = norm_a_sq.sqrt();
        let norm_b = norm_b_sq.sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
        }
    }

    pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
        Self::squared_distance(a, b).sqrt()
    }

    pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
        let norm = Self::norm(&vector);
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }

    /// Full cosine similarity matrix, rows computed in parallel
    pub fn pairwise_cosine(vectors: &[&[f32]]) -> Vec<Vec<f32>> {
        vectors
            .par_iter()
            .map(|row| {
                vectors
                    .iter()
                    .map(|col| Self::cosine_similarity(row, col))
                    .collect()
            })
            .collect()
    }
}
