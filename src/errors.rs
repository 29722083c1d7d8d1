//! Error types for the verirag pipeline
//!
//! Component internals use `anyhow` with context; the orchestrator wraps
//! anything that escapes into a `RagError` carrying the pipeline stage and
//! the query it was processing.

use thiserror::Error;

/// Main error type surfaced at the pipeline boundary
#[derive(Error, Debug)]
pub enum RagError {
    /// A pipeline stage failed; carries stage and query context for logging
    #[error("{stage} stage failed for query '{query}': {source}")]
    Stage {
        stage: &'static str,
        query: String,
        #[source]
        source: anyhow::Error,
    },

    /// Worker pool shut down while a request was queued
    #[error("worker pool unavailable: {0}")]
    PoolClosed(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Wrap a component failure with stage and query context
    pub fn at_stage(stage: &'static str, query: &str, source: anyhow::Error) -> Self {
        RagError::Stage {
            stage,
            query: query.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_carries_context() {
        let err = RagError::at_stage(
            "retrieval",
            "when was AI founded?",
            anyhow::anyhow!("index offline"),
        );
        let msg = err.to_string();
        assert!(msg.contains("retrieval"));
        assert!(msg.contains("when was AI founded?"));
        assert!(msg.contains("index offline"));
    }

    #[test]
    fn test_pool_closed_display() {
        let err = RagError::PoolClosed("semaphore closed".to_string());
        assert!(err.to_string().contains("semaphore closed"));
    }
}
