//! Text embedding collaborator.
//!
//! One embedder serves both sides of the system: memory statements are
//! embedded at ingestion time and queries at retrieval time. Mixing
//! embedders between the two sides makes every similarity meaningless, so
//! pipelines and engines should be handed clones of the same service.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;

use memoir_core::error::{MemoirError, Result};
use memoir_core::types::Embedding;

/// Service for generating text embeddings.
pub trait TextEmbedder: Send + Sync {
    /// Embed the given text. Must reject empty input.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Embedding>> + Send;

    /// Dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe twin of [`TextEmbedder`].
pub trait DynTextEmbedder: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Embedding>> + Send + 'a>>;

    fn dimensions(&self) -> usize;
}

impl<T: TextEmbedder> DynTextEmbedder for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Embedding>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        TextEmbedder::dimensions(self)
    }
}

/// Deterministic hash-based embedder.
///
/// Identical inputs always produce identical unit vectors, so ranking and
/// dedup logic can be tested without a model. Also serves as the model-free
/// CLI backend.
#[derive(Debug, Clone, Default)]
pub struct MockTextEmbedder;

impl MockTextEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_vector(text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(384);
        for i in 0..384 {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        // L2-normalize to unit length, matching what real embedding
        // backends emit.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl TextEmbedder for MockTextEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(MemoirError::Retrieval(
                "cannot embed empty text".to_string(),
            ));
        }
        Embedding::new(Self::hash_to_vector(text))
            .map_err(|e| MemoirError::Retrieval(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        384
    }
}
