//! Shared data model for the pipeline
//!
//! Everything here is created fresh per request and discarded with the
//! response, except `MemoryRecord`, which the orchestrator persists through
//! the memory-store collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A retrievable unit of previously indexed text with a relevance score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    /// Relevance score in [0, 1]
    pub score: f32,
    pub metadata: serde_json::Map<String, JsonValue>,
}

impl RetrievedChunk {
    pub fn new(id: impl Into<String>, doc_id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            doc_id: doc_id.into(),
            text: text.into(),
            score,
            metadata: serde_json::Map::new(),
        }
    }
}

/// Sort chunks descending by score. The sort is stable, so ties keep their
/// original discovery order.
pub fn sort_chunks_desc(chunks: &mut [RetrievedChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Result of a generation-collaborator call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer: String,
    pub model_id: String,
    /// Chunk ids the generator attributes the answer to
    pub provenance: Vec<String>,
    pub metadata: HashMap<String, JsonValue>,
}

/// Tuple the orchestrator persists after a successful pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub query: String,
    pub answer: String,
    pub chunk_ids: Vec<String>,
    pub chunk_scores: Vec<f32>,
    pub intent: Option<String>,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

/// A prior Q/A pair returned by the memory-store collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub query: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Score multiplier applied when a prior Q/A pair is re-injected as a chunk
pub const MEMORY_CHUNK_SCORE_FACTOR: f32 = 0.8;

impl MemoryEntry {
    /// Re-inject this prior Q/A pair as a synthetic retrieval chunk
    pub fn as_chunk(&self, similarity: f32) -> RetrievedChunk {
        let mut chunk = RetrievedChunk::new(
            format!("memory_{}", self.id),
            "memory",
            format!("Previous Q: {}\nA: {}", self.query, self.answer),
            similarity * MEMORY_CHUNK_SCORE_FACTOR,
        );
        chunk
            .metadata
            .insert("source".to_string(), JsonValue::from("memory"));
        chunk
            .metadata
            .insert("memory_id".to_string(), JsonValue::from(self.id.clone()));
        chunk
    }
}

/// Boundary request consumed by whatever front door is deployed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub filters: Option<HashMap<String, String>>,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_true")]
    pub use_memory: bool,
    #[serde(default = "default_true")]
    pub use_reflection: bool,
}

fn default_true() -> bool {
    true
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: None,
            filters: None,
            use_cache: true,
            use_memory: true,
            use_reflection: true,
        }
    }
}

/// Verification summary carried on the response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub hallucination_score: f32,
    pub support_ratio: f32,
    pub unsupported_claim_count: usize,
}

/// Per-stage durations, in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub retrieval_ms: u64,
    pub generation_ms: u64,
    pub reflection_ms: u64,
    pub total_ms: u64,
}

/// Response metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model_id: String,
    pub timings: StageTimings,
    pub cached: bool,
    pub reflection_enabled: bool,
    pub memory_enabled: bool,
}

/// Assembled pipeline response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query_id: String,
    pub query: String,
    pub answer: String,
    pub chunks: Vec<RetrievedChunk>,
    pub provenance: Vec<String>,
    pub intent: Option<String>,
    pub verification: Option<VerificationSummary>,
    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_chunks_desc_is_stable() {
        let mut chunks = vec![
            RetrievedChunk::new("a", "d1", "first", 0.5),
            RetrievedChunk::new("b", "d1", "second", 0.9),
            RetrievedChunk::new("c", "d1", "tied with a", 0.5),
        ];
        sort_chunks_desc(&mut chunks);
        assert_eq!(chunks[0].id, "b");
        assert_eq!(chunks[1].id, "a");
        assert_eq!(chunks[2].id, "c");
    }

    #[test]
    fn test_memory_entry_as_chunk_scales_score() {
        let entry = MemoryEntry {
            id: "m1".to_string(),
            query: "what is AI?".to_string(),
            answer: "A field of computer science.".to_string(),
            created_at: Utc::now(),
        };
        let chunk = entry.as_chunk(0.5);
        assert_eq!(chunk.id, "memory_m1");
        assert!((chunk.score - 0.4).abs() < 1e-6);
        assert!(chunk.text.starts_with("Previous Q: what is AI?"));
        assert_eq!(chunk.metadata["source"], "memory");
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "hello"}"#).unwrap();
        assert!(req.use_cache);
        assert!(req.use_memory);
        assert!(req.use_reflection);
        assert!(req.k.is_none());
    }
}
