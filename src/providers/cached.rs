//! Embedding provider wrapper backed by the cache's embedding partition

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::cache::CacheManager;
use crate::providers::EmbeddingProvider;

/// Wraps an embedding provider so repeated texts hit the embedding cache
/// partition instead of the collaborator.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Arc<CacheManager>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.cache.get_embedding(self.inner.model_id(), text) {
            return Ok(vector);
        }
        let vector = self.inner.embed(text).await?;
        self.cache
            .cache_embedding(self.inner.model_id(), text, vector.clone());
        Ok(vector)
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        self.inner.similarity(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_id(&self) -> &str {
            "counting"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn test_second_embed_hits_cache() {
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let embedder = CachedEmbedder::new(inner.clone(), cache);

        let first = embedder.embed("hello").await.unwrap();
        let second = embedder.embed("hello").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
