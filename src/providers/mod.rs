//! Collaborator contracts consumed by the core
//!
//! The embedding model, vector search engine, generation backend, and
//! durable memory store are external capabilities; the pipeline only sees
//! these traits. Calls into them are the pipeline's only suspension points.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::{GenerationResult, MemoryEntry, MemoryRecord, RetrievedChunk};

mod cached;
pub use cached::CachedEmbedder;

/// Embedding / similarity capability
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model, used to namespace cache keys
    fn model_id(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Cosine similarity between two vectors, in [-1, 1]
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

/// Vector-similarity search capability over the indexed corpus
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Ranked search; scores are expected in [0, 1] descending
    async fn search(
        &self,
        embedding: &[f32],
        k: usize,
        filters: Option<&HashMap<String, String>>,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Language-model text generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    /// Sampling temperature used when no override is given
    fn base_temperature(&self) -> f32;

    /// Generate an answer grounded in the given chunks. A temperature
    /// override applies to this call only; the base temperature is never
    /// mutated.
    async fn generate(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        temperature_override: Option<f32>,
    ) -> Result<GenerationResult>;
}

/// Durable memory store for prior Q/A pairs
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn create(&self, record: &MemoryRecord) -> Result<String>;

    /// Ranked recall of similar prior entries with similarity scores
    async fn search(&self, query: &str, k: usize) -> Result<Vec<(MemoryEntry, f32)>>;
}

/// Cosine similarity, 0.0 when either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
