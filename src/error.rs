//! Error types for the ingestion pipeline.
//!
//! Configuration and index-availability problems are fatal preconditions,
//! surfaced before any work starts. Per-file and per-batch failures are
//! isolated and accumulated into the run report so one bad document never
//! aborts a whole ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Failures produced by the scan/chunk/embed/reconcile pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Chunking parameters that cannot produce a valid window sequence
    /// (zero size, or overlap not smaller than size).
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A single file could not be read (permissions, encoding). The scan
    /// continues; the file is reported in the run's error list.
    #[error("unreadable document {}: {reason}", path.display())]
    UnreadableDocument { path: PathBuf, reason: String },

    /// An embedding batch exhausted its retries or failed permanently.
    /// Carries the fingerprints of the affected chunks so the caller can
    /// abort the run or record the batch and continue.
    #[error("embedding batch of {} chunks failed after {attempts} attempt(s): {reason}", fingerprints.len())]
    EmbeddingBatchFailed {
        fingerprints: Vec<String>,
        attempts: u32,
        reason: String,
    },

    /// The persisted vector index could not be opened or created.
    #[error("index unavailable at {}: {reason}", path.display())]
    IndexUnavailable { path: PathBuf, reason: String },
}

/// Outcome of a single call to the external embedding service.
///
/// Transient failures (rate limits, server errors, network drops) are
/// candidates for backoff and retry; permanent failures fail the batch
/// immediately without further attempts.
#[derive(Debug, Error)]
pub enum EmbedCallError {
    #[error("transient embedding failure: {0}")]
    Transient(String),

    #[error("permanent embedding failure: {0}")]
    Permanent(String),
}

impl EmbedCallError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbedCallError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failed_message_counts_chunks() {
        let err = IngestError::EmbeddingBatchFailed {
            fingerprints: vec!["a".into(), "b".into(), "c".into()],
            attempts: 4,
            reason: "rate limited".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 chunks"));
        assert!(msg.contains("4 attempt"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(EmbedCallError::Transient("timeout".into()).is_transient());
        assert!(!EmbedCallError::Permanent("bad request".into()).is_transient());
    }
}
