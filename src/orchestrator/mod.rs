//! Pipeline orchestrator
//!
//! Owns the end-to-end query flow: cache lookup, retrieval with memory
//! augmentation, generation, reflection, memory write, response assembly.
//! A semaphore bounds how many queries run concurrently; stage failures are
//! wrapped with the stage name and the query before surfacing.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::config::RagConfig;
use crate::errors::{RagError, Result};
use crate::intent::IntentClassifier;
use crate::providers::{CachedEmbedder, EmbeddingProvider, Generator, MemoryStore, VectorSearch};
use crate::reflection::ReflectionAgent;
use crate::retrieval::{PolicyTable, RetrievalController};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::types::{
    sort_chunks_desc, MemoryRecord, QueryRequest, QueryResponse, ResponseMetadata, RetrievedChunk,
    StageTimings, VerificationSummary,
};
use crate::verification::VerificationEngine;

/// Prior entries fetched from the memory store per query
const MEMORY_RECALL_LIMIT: usize = 3;
/// Recalled entries actually spliced into the chunk list
const MEMORY_SPLICE_LIMIT: usize = 2;
/// Minimum similarity for a recalled entry to be considered
const MEMORY_SIMILARITY_FLOOR: f32 = 0.3;

/// Coordinates the full query pipeline across its collaborators
pub struct Orchestrator {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    memory: Option<Arc<dyn MemoryStore>>,
    classifier: IntentClassifier,
    controller: RetrievalController,
    reflection: ReflectionAgent,
    cache: Arc<CacheManager>,
    telemetry: TelemetryCollector,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn VectorSearch>,
        generator: Arc<dyn Generator>,
        memory: Option<Arc<dyn MemoryStore>>,
    ) -> Self {
        let cache = Arc::new(CacheManager::new(config.cache.clone()));
        // All embedding calls go through the cache's embedding partition.
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(CachedEmbedder::new(embedder, cache.clone()));

        let controller =
            RetrievalController::new(PolicyTable::standard(), embedder.clone(), search);
        let verifier = VerificationEngine::new(embedder.clone());
        let reflection = ReflectionAgent::with_limits(
            verifier,
            config.reflection.max_iterations,
            config.reflection.hallucination_threshold,
        );
        let semaphore = Arc::new(Semaphore::new(config.pipeline.worker_count.max(1)));

        Self {
            config,
            embedder,
            generator,
            memory,
            classifier: IntentClassifier::new(),
            controller,
            reflection,
            cache,
            telemetry: TelemetryCollector::new(),
            semaphore,
        }
    }

    /// Run one query through the pipeline. Holds a worker permit for the
    /// whole run, so at most `worker_count` queries execute at once.
    pub async fn process_query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| RagError::PoolClosed(e.to_string()))?;

        let total_start = Instant::now();
        let query = request.query.as_str();
        let use_cache = request.use_cache && self.config.pipeline.use_cache;
        let use_memory = request.use_memory && self.config.pipeline.use_memory;
        let use_reflection = request.use_reflection && self.config.reflection.enabled;

        // Full-result cache short-circuits the whole pipeline.
        if use_cache {
            let hit = self.cache.get_query_result(query);
            self.telemetry.record(TelemetryEvent::CacheLookup {
                partition: "query".to_string(),
                hit: hit.is_some(),
                timestamp: Instant::now(),
            });
            if let Some(mut response) = hit {
                response.metadata.cached = true;
                response.metadata.timings.total_ms = total_start.elapsed().as_millis() as u64;
                self.telemetry.record(TelemetryEvent::QueryCompleted {
                    query_id: response.query_id.clone(),
                    duration_ms: response.metadata.timings.total_ms,
                    cached: true,
                    timestamp: Instant::now(),
                });
                return Ok(response);
            }
        }

        let mut timings = StageTimings::default();

        // Retrieval, memory splice included; a retrieval-cache hit replays
        // the merged list without touching the memory store again.
        let retrieval_start = Instant::now();
        let (chunks, intent) = self.retrieve_chunks(&request, use_cache, use_memory).await?;
        timings.retrieval_ms = retrieval_start.elapsed().as_millis() as u64;
        self.telemetry.record(TelemetryEvent::StageCompleted {
            stage: "retrieval".to_string(),
            duration_ms: timings.retrieval_ms,
            success: true,
            timestamp: Instant::now(),
        });

        // Generation
        let generation_start = Instant::now();
        let generation = self
            .generator
            .generate(query, &chunks, None)
            .await
            .map_err(|e| RagError::at_stage("generation", query, e))?;
        timings.generation_ms = generation_start.elapsed().as_millis() as u64;
        self.telemetry.record(TelemetryEvent::StageCompleted {
            stage: "generation".to_string(),
            duration_ms: timings.generation_ms,
            success: true,
            timestamp: Instant::now(),
        });

        // Reflection
        let mut answer = generation.answer.clone();
        let mut verification: Option<VerificationSummary> = None;
        if use_reflection {
            let reflection_start = Instant::now();
            let result = self
                .reflection
                .reflect_on_answer(
                    &answer,
                    query,
                    &chunks,
                    Some(self.generator.as_ref()),
                    Some(&self.controller),
                )
                .await
                .map_err(|e| RagError::at_stage("reflection", query, e))?;
            timings.reflection_ms = reflection_start.elapsed().as_millis() as u64;

            for (i, decision) in result.decisions.iter().enumerate() {
                self.telemetry.record(TelemetryEvent::ReflectionDecision {
                    action: decision.action.as_str().to_string(),
                    iteration: i + 1,
                    timestamp: Instant::now(),
                });
            }

            answer = result.final_answer;
            verification = Some(VerificationSummary {
                hallucination_score: result.verification.hallucination_score,
                support_ratio: result.verification.support_ratio,
                unsupported_claim_count: result.verification.unsupported_claims.len(),
            });
        }

        // Memory write happens for every completed run, refusals included;
        // a refused query recalled later short-circuits the same way a
        // cached one does. A store failure aborts the request.
        let query_id = Uuid::new_v4().to_string();
        if use_memory {
            if let Some(memory) = &self.memory {
                let record = MemoryRecord {
                    query: query.to_string(),
                    answer: answer.clone(),
                    chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
                    chunk_scores: chunks.iter().map(|c| c.score).collect(),
                    intent: intent.clone(),
                    model_id: self.generator.model_id().to_string(),
                    created_at: chrono::Utc::now(),
                };
                memory
                    .create(&record)
                    .await
                    .map_err(|e| RagError::at_stage("memory_write", query, e))?;
                self.telemetry.record(TelemetryEvent::MemoryWrite {
                    query_id: query_id.clone(),
                    timestamp: Instant::now(),
                });
            }
        }

        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let response = QueryResponse {
            query_id: query_id.clone(),
            query: query.to_string(),
            answer,
            chunks,
            provenance: generation.provenance,
            intent,
            verification,
            metadata: ResponseMetadata {
                model_id: generation.model_id,
                timings,
                cached: false,
                reflection_enabled: use_reflection,
                memory_enabled: use_memory,
            },
        };

        if use_cache {
            self.cache.cache_query_result(query, response.clone());
        }
        self.telemetry.record(TelemetryEvent::QueryCompleted {
            query_id,
            duration_ms: response.metadata.timings.total_ms,
            cached: false,
            timestamp: Instant::now(),
        });

        Ok(response)
    }

    /// Fetch chunks from the retrieval cache or the controller. Memory
    /// splicing happens before the cache write, so the cached entry is the
    /// merged list and a hit never re-queries the memory store.
    async fn retrieve_chunks(
        &self,
        request: &QueryRequest,
        use_cache: bool,
        use_memory: bool,
    ) -> Result<(Vec<RetrievedChunk>, Option<String>)> {
        let query = request.query.as_str();

        if use_cache {
            let hit = self.cache.get_retrieval(query);
            self.telemetry.record(TelemetryEvent::CacheLookup {
                partition: "retrieval".to_string(),
                hit: hit.is_some(),
                timestamp: Instant::now(),
            });
            if let Some(chunks) = hit {
                // Classification is deterministic and local, so the cached
                // path still reports the intent.
                let classification = self.classifier.classify(query);
                return Ok((chunks, Some(classification.primary_intent.as_str().to_string())));
            }
        }

        let outcome = self
            .controller
            .retrieve(query, request.filters.as_ref(), request.k, None)
            .await
            .map_err(|e| RagError::at_stage("retrieval", query, e))?;

        let mut chunks = outcome.chunks;
        if use_memory {
            self.augment_with_memory(query, &mut chunks).await;
        }

        if use_cache {
            self.cache.cache_retrieval(query, chunks.clone());
        }

        Ok((chunks, Some(outcome.intent.as_str().to_string())))
    }

    /// Splice high-similarity prior Q/A pairs into the chunk list. Memory
    /// failures degrade to corpus-only retrieval.
    async fn augment_with_memory(&self, query: &str, chunks: &mut Vec<RetrievedChunk>) {
        let Some(memory) = &self.memory else {
            return;
        };

        let recalled = match memory.search(query, MEMORY_RECALL_LIMIT).await {
            Ok(recalled) => recalled,
            Err(_) => {
                self.telemetry.record(TelemetryEvent::StageCompleted {
                    stage: "memory_recall".to_string(),
                    duration_ms: 0,
                    success: false,
                    timestamp: Instant::now(),
                });
                return;
            }
        };

        let mut spliced = 0usize;
        for (entry, similarity) in recalled {
            if similarity < MEMORY_SIMILARITY_FLOOR || spliced >= MEMORY_SPLICE_LIMIT {
                continue;
            }
            chunks.push(entry.as_chunk(similarity));
            spliced += 1;
        }

        if spliced > 0 {
            sort_chunks_desc(chunks);
        }
    }

    /// Drop the cached entries for a query so the next run recomputes it
    pub fn invalidate_query(&self, query: &str) {
        self.cache.invalidate_query(query);
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The cache-wrapped embedder shared by retrieval and verification
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }
}
