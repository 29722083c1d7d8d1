//! Multi-partition expiring cache
//!
//! Three independently bounded partitions (embeddings, retrieval results,
//! full query results), each keyed by a blake3 hash of a namespaced string.
//! Hit/miss accounting is cumulative across partitions.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

use crate::types::{QueryResponse, RetrievedChunk};

mod store;
pub use store::TtlStore;

/// Default entry lifetime, in seconds
pub const DEFAULT_TTL_SECONDS: u64 = 3600;
/// Default per-partition entry capacity
pub const DEFAULT_PARTITION_CAPACITY: usize = 10_000;

/// Cache partition selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePartition {
    Embeddings,
    Retrieval,
    Query,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for every partition, in seconds
    pub ttl_seconds: u64,
    /// Maximum entries per partition; overflow evicts oldest
    pub partition_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS,
            partition_capacity: DEFAULT_PARTITION_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    embeddings_cached: u64,
    retrievals_cached: u64,
    queries_cached: u64,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0 when no requests have been made
    pub hit_rate: f64,
    pub embeddings_cached: u64,
    pub retrievals_cached: u64,
    pub queries_cached: u64,
    pub embedding_entries: usize,
    pub retrieval_entries: usize,
    pub query_entries: usize,
}

/// Manages the three cache partitions with hit/miss accounting
pub struct CacheManager {
    embeddings: TtlStore<Vec<f32>>,
    retrievals: TtlStore<Vec<RetrievedChunk>>,
    queries: TtlStore<QueryResponse>,
    counters: Mutex<Counters>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);
        let capacity = config.partition_capacity;
        Self {
            embeddings: TtlStore::new(capacity, ttl),
            retrievals: TtlStore::new(capacity, ttl),
            queries: TtlStore::new(capacity, ttl),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Deterministic key for a namespaced string
    fn cache_key(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }

    fn embedding_key(model: &str, text: &str) -> String {
        Self::cache_key(&format!("{}:{}", model, text))
    }

    fn retrieval_key(query: &str) -> String {
        Self::cache_key(&format!("retrieval:{}", query))
    }

    fn query_key(query: &str) -> String {
        Self::cache_key(&format!("query:{}", query))
    }

    fn record_lookup(&self, hit: bool) {
        let mut counters = self.counters.lock().unwrap();
        if hit {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
    }

    /// Cache an embedding vector; returns the cache key
    pub fn cache_embedding(&self, model: &str, text: &str, embedding: Vec<f32>) -> String {
        let key = Self::embedding_key(model, text);
        self.embeddings.set(key.clone(), embedding);
        self.counters.lock().unwrap().embeddings_cached += 1;
        key
    }

    pub fn get_embedding(&self, model: &str, text: &str) -> Option<Vec<f32>> {
        let result = self.embeddings.get(&Self::embedding_key(model, text));
        self.record_lookup(result.is_some());
        result
    }

    /// Cache retrieval results for a query; returns the cache key
    pub fn cache_retrieval(&self, query: &str, chunks: Vec<RetrievedChunk>) -> String {
        let key = Self::retrieval_key(query);
        self.retrievals.set(key.clone(), chunks);
        self.counters.lock().unwrap().retrievals_cached += 1;
        key
    }

    pub fn get_retrieval(&self, query: &str) -> Option<Vec<RetrievedChunk>> {
        let result = self.retrievals.get(&Self::retrieval_key(query));
        self.record_lookup(result.is_some());
        result
    }

    /// Cache a complete query result; returns the cache key
    pub fn cache_query_result(&self, query: &str, result: QueryResponse) -> String {
        let key = Self::query_key(query);
        self.queries.set(key.clone(), result);
        self.counters.lock().unwrap().queries_cached += 1;
        key
    }

    pub fn get_query_result(&self, query: &str) -> Option<QueryResponse> {
        let result = self.queries.get(&Self::query_key(query));
        self.record_lookup(result.is_some());
        result
    }

    /// Remove both the full-result and the retrieval entries for a query.
    /// Both partition locks are held for the removal, so no observer can see
    /// one entry gone and the other still present.
    pub fn invalidate_query(&self, query: &str) {
        let mut queries = self.queries.lock();
        let mut retrievals = self.retrievals.lock();
        queries.remove(&Self::query_key(query));
        retrievals.remove(&Self::retrieval_key(query));
    }

    /// Clear one partition, or all of them. Clearing everything also resets
    /// the cumulative counters.
    pub fn clear_cache(&self, partition: Option<CachePartition>) {
        match partition {
            Some(CachePartition::Embeddings) => self.embeddings.clear(),
            Some(CachePartition::Retrieval) => self.retrievals.clear(),
            Some(CachePartition::Query) => self.queries.clear(),
            None => {
                self.embeddings.clear();
                self.retrievals.clear();
                self.queries.clear();
                *self.counters.lock().unwrap() = Counters::default();
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let counters = *self.counters.lock().unwrap();
        let total = counters.hits + counters.misses;
        let hit_rate = if total > 0 {
            counters.hits as f64 / total as f64
        } else {
            0.0
        };
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            hit_rate,
            embeddings_cached: counters.embeddings_cached,
            retrievals_cached: counters.retrievals_cached,
            queries_cached: counters.queries_cached,
            embedding_entries: self.embeddings.len(),
            retrieval_entries: self.retrievals.len(),
            query_entries: self.queries.len(),
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseMetadata, StageTimings};

    fn sample_response(query: &str, answer: &str) -> QueryResponse {
        QueryResponse {
            query_id: "q-test".to_string(),
            query: query.to_string(),
            answer: answer.to_string(),
            chunks: Vec::new(),
            provenance: Vec::new(),
            intent: None,
            verification: None,
            metadata: ResponseMetadata {
                model_id: "mock".to_string(),
                timings: StageTimings::default(),
                cached: false,
                reflection_enabled: false,
                memory_enabled: false,
            },
        }
    }

    #[test]
    fn test_query_result_roundtrip() {
        let cache = CacheManager::default();
        cache.cache_query_result("q1", sample_response("q1", "answer one"));

        let fetched = cache.get_query_result("q1").expect("cached result");
        assert_eq!(fetched.answer, "answer one");

        cache.invalidate_query("q1");
        assert!(cache.get_query_result("q1").is_none());
    }

    #[test]
    fn test_invalidate_removes_both_partitions() {
        let cache = CacheManager::default();
        cache.cache_query_result("q1", sample_response("q1", "a"));
        cache.cache_retrieval("q1", vec![RetrievedChunk::new("c1", "d1", "text", 0.9)]);

        cache.invalidate_query("q1");

        assert!(cache.get_query_result("q1").is_none());
        assert!(cache.get_retrieval("q1").is_none());
    }

    #[test]
    fn test_hit_rate_accounting() {
        let cache = CacheManager::default();
        assert_eq!(cache.stats().hit_rate, 0.0);

        cache.cache_embedding("model", "hello", vec![0.1, 0.2]);
        assert!(cache.get_embedding("model", "hello").is_some()); // hit
        assert!(cache.get_embedding("model", "other").is_none()); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.embeddings_cached, 1);
    }

    #[test]
    fn test_ttl_expiry_is_a_miss() {
        let cache = CacheManager::new(CacheConfig {
            ttl_seconds: 0,
            partition_capacity: 16,
        });
        cache.cache_retrieval("q1", vec![RetrievedChunk::new("c1", "d1", "text", 0.5)]);
        assert!(cache.get_retrieval("q1").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_clear_all_resets_counters() {
        let cache = CacheManager::default();
        cache.cache_embedding("m", "t", vec![1.0]);
        cache.get_embedding("m", "t");

        cache.clear_cache(None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.embedding_entries, 0);
    }

    #[test]
    fn test_clear_single_partition_keeps_counters() {
        let cache = CacheManager::default();
        cache.cache_embedding("m", "t", vec![1.0]);
        cache.get_embedding("m", "t");

        cache.clear_cache(Some(CachePartition::Embeddings));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.embedding_entries, 0);
    }

    #[test]
    fn test_keys_are_deterministic_and_namespaced() {
        assert_eq!(
            CacheManager::query_key("abc"),
            CacheManager::query_key("abc")
        );
        assert_ne!(
            CacheManager::query_key("abc"),
            CacheManager::retrieval_key("abc")
        );
    }
}
