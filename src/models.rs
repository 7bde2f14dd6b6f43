//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, and reports that flow
//! through scanning, chunking, embedding, and reconciliation.

use std::path::PathBuf;

use serde::Serialize;

use crate::metadata::{Category, DataType, DocumentTags, Mission};

/// A document discovered by the corpus scanner: its location, full text,
/// and the tags classified from its path. Immutable once read.
#[derive(Debug, Clone)]
pub struct ScannedDocument {
    /// Absolute location on disk.
    pub path: PathBuf,
    /// Path relative to its corpus root; the stored document identity.
    pub source_path: String,
    pub text: String,
    pub tags: DocumentTags,
}

/// A text span cut from a document by the chunker.
///
/// Offsets are character positions within the source text. The fingerprint
/// is a SHA-256 hex digest of `content` and serves as the chunk's identity
/// for dedup and update decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sequence_index: usize,
    pub fingerprint: String,
}

/// Metadata persisted alongside each index entry.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    pub mission: Mission,
    pub category: Category,
    pub data_type: DataType,
    pub source_path: String,
    pub chunk_index: usize,
}

/// A chunk paired with its document identity and tags, ready for embedding
/// and indexing.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sequence_index: usize,
    pub fingerprint: String,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    pub fn from_span(span: ChunkSpan, source_path: &str, tags: DocumentTags) -> Self {
        ChunkRecord {
            metadata: ChunkMetadata {
                mission: tags.mission,
                category: tags.category,
                data_type: tags.data_type,
                source_path: source_path.to_string(),
                chunk_index: span.sequence_index,
            },
            content: span.content,
            start_offset: span.start_offset,
            end_offset: span.end_offset,
            sequence_index: span.sequence_index,
            fingerprint: span.fingerprint,
        }
    }
}

/// How reconciliation treats chunks already present in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Insert only fingerprints absent from the whole collection; never
    /// touch or delete existing entries.
    Skip,
    /// Insert fingerprints absent from the document's own entries,
    /// refreshing metadata when the content exists under another path;
    /// never delete.
    Update,
    /// Delete every entry for the document's source path, then insert the
    /// full new chunk set.
    Replace,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Skip => "skip",
            UpdateMode::Update => "update",
            UpdateMode::Replace => "replace",
        }
    }
}

/// What to do when an embedding batch fails permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run at the first failed batch (default).
    Abort,
    /// Record the batch in the report's errors and continue; its chunks
    /// stay unembedded and unindexed.
    SkipBatch,
}

/// A per-file or per-batch failure recorded in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of one ingestion run, accumulated across every document.
///
/// A report with an empty `errors` list is the success criterion for a
/// clean run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub documents_seen: u64,
    pub chunks_seen: u64,
    pub added: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub embedded: u64,
    pub errors: Vec<IngestFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(IngestFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }
}

/// A ranked entry returned from the vector index.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub fingerprint: String,
    pub content: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Per-mission slice of the index.
#[derive(Debug, Clone, Serialize)]
pub struct MissionCount {
    pub mission: String,
    pub documents: i64,
    pub chunks: i64,
}

/// Read-only aggregate view of one collection.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub document_count: i64,
    pub chunk_count: i64,
    pub mission_breakdown: Vec<MissionCount>,
}

/// A collection discovered in the persisted store.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub document_count: i64,
    pub chunk_count: i64,
}
