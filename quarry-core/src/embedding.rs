//! Embedding vector operations and the embedding collaborator contract.
//!
//! The vector store engine treats embedding as an opaque
//! `embed(text) -> vector` collaborator. Providers are network-backed
//! in production, so the trait is async; `HashEmbedding` is the
//! deterministic in-process provider the test suites share.

use crate::error::{QuarryError, QuarryResult, VectorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Embedding vector with dynamic dimensions.
/// Supports any embedding model dimension (e.g., 384, 768, 1536, 3072).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    /// The embedding data as a vector of f32 values.
    pub data: Vec<f32>,
    /// Identifier of the model that produced this embedding.
    pub model_id: String,
    /// Number of dimensions (must match data.len()).
    pub dimensions: i32,
}

impl EmbeddingVector {
    /// Create a new embedding vector.
    pub fn new(data: Vec<f32>, model_id: String) -> Self {
        let dimensions = data.len() as i32;
        Self {
            data,
            model_id,
            dimensions,
        }
    }

    /// Compute cosine similarity between two embedding vectors.
    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> QuarryResult<f32> {
        if self.dimensions != other.dimensions {
            return Err(QuarryError::Vector(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got: other.dimensions,
            }));
        }

        let mut dot_product = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot_product += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let norm_a = norm_a.sqrt();
        let norm_b = norm_b.sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return Ok(0.0);
        }

        Ok(dot_product / (norm_a * norm_b))
    }

    /// Check if this vector has valid dimensions.
    pub fn is_valid(&self) -> bool {
        self.dimensions > 0 && self.data.len() == self.dimensions as usize
    }
}

/// Trait for embedding providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// Identical text must yield comparable vectors within one namespace's
/// configured dimension; the engine batch-embeds chunks through
/// `embed_texts` where possible.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed_text(&self, text: &str) -> QuarryResult<EmbeddingVector>;

    /// Generate embeddings for multiple texts in a batch.
    /// More efficient than calling embed_text() multiple times.
    /// Returns vectors in the same order as the input.
    async fn embed_texts(&self, texts: &[&str]) -> QuarryResult<Vec<EmbeddingVector>>;

    /// The number of dimensions this provider produces.
    fn dimensions(&self) -> i32;

    /// The model identifier for this provider.
    fn model_id(&self) -> &str;
}

/// Deterministic hash-based embedding provider.
///
/// Maps each whitespace token into a bucket of a fixed-dimension vector
/// via a stable hash, so identical text always produces identical
/// vectors and overlapping text produces correlated ones. Not a real
/// embedding model; intended for tests and local development.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: i32,
}

impl HashEmbedding {
    pub fn new(dimensions: i32) -> Self {
        Self { dimensions }
    }

    fn embed_sync(&self, text: &str) -> EmbeddingVector {
        let dims = self.dimensions.max(1) as usize;
        let mut data = vec![0.0f32; dims];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % dims as u64) as usize;
            data[bucket] += 1.0;
        }
        EmbeddingVector::new(data, self.model_id().to_string())
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed_text(&self, text: &str) -> QuarryResult<EmbeddingVector> {
        Ok(self.embed_sync(text))
    }

    async fn embed_texts(&self, texts: &[&str]) -> QuarryResult<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> i32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "hash-embedding"
    }
}

// =============================================================================
// TESTS
// =============================================================================
