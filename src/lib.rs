//! verirag - Verified retrieval-augmented question answering
//!
//! A pipeline core that retrieves evidence adaptively per query intent,
//! verifies generated answers claim by claim, and reflects on weak answers
//! until they are supported or refused.
//!
//! # Architecture
//!
//! - **intent**: rule-based query intent classification
//! - **retrieval**: intent-adaptive retrieval policies and controller
//! - **verification**: claim extraction and per-claim support checking
//! - **reflection**: bounded accept/retry/escalate/refuse loop
//! - **cache**: partitioned TTL cache for embeddings, retrievals, results
//! - **orchestrator**: end-to-end query flow behind a worker pool

pub mod cache;
pub mod config;
pub mod errors;
pub mod intent;
pub mod orchestrator;
pub mod providers;
pub mod reflection;
pub mod retrieval;
pub mod telemetry;
pub mod types;
pub mod verification;

// Re-export commonly used types
pub use errors::{RagError, Result};
pub use orchestrator::Orchestrator;
pub use types::{QueryRequest, QueryResponse, RetrievedChunk};
