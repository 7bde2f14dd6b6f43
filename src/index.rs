//! The persistent vector index and its reconciliation semantics.
//!
//! [`VectorIndex`] owns the SQLite store. Each entry is keyed by
//! `(collection, content fingerprint)` and carries the chunk's text, its
//! embedding vector, and the classified metadata. Because the fingerprint
//! is a hash of the chunk content, inserting the same content twice is
//! idempotent, which is what makes re-ingestion safe.
//!
//! # Update modes
//!
//! Reconciliation happens one document at a time, inside a transaction:
//!
//! - **skip** - insert only fingerprints absent from the whole collection;
//!   existing entries are never touched. The default.
//! - **update** - insert fingerprints absent from the document's own entry
//!   set. Content that already exists under a different source path is
//!   re-associated with this document (metadata and vector refreshed).
//!   Never deletes.
//! - **replace** - delete every entry for the document's source path, then
//!   insert the full new chunk set.
//!
//! The pre-filter queries ([`VectorIndex::collection_fingerprints`],
//! [`VectorIndex::source_fingerprints`]) let the pipeline avoid embedding
//! chunks that a mode would not write anyway; the `ON CONFLICT` clauses
//! below are the correctness backstop when the pre-filter is stale (e.g. a
//! retried run racing its own earlier inserts).
//!
//! Query-time search does a full scan of the collection and ranks by
//! cosine similarity in Rust; corpora here are a few thousand documents,
//! well within full-scan range.

use std::collections::HashSet;
use std::path::PathBuf;

use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedder::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::IngestError;
use crate::metadata::{Category, DataType, Mission};
use crate::migrate;
use crate::models::{
    ChunkMetadata, ChunkRecord, CollectionInfo, IndexStats, MissionCount, RetrievedChunk,
    UpdateMode,
};

/// Handle to one collection in the persisted store.
pub struct VectorIndex {
    pool: SqlitePool,
    path: PathBuf,
    collection: String,
}

/// Counts from reconciling a single document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocOutcome {
    pub added: u64,
    pub skipped: u64,
    pub deleted: u64,
}

impl VectorIndex {
    /// Open (creating if missing) the store at the configured path and
    /// ensure the schema exists. Any failure is [`IngestError::IndexUnavailable`].
    pub async fn open(config: &Config) -> Result<Self, IngestError> {
        let pool = db::connect(&config.index.path).await?;
        migrate::ensure_schema(&pool)
            .await
            .map_err(|e| IngestError::IndexUnavailable {
                path: config.index.path.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool,
            path: config.index.path.clone(),
            collection: config.index.collection.clone(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Every fingerprint stored in this collection. Used as the skip-mode
    /// pre-filter, fetched once per run.
    pub async fn collection_fingerprints(&self) -> Result<HashSet<String>, IngestError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT fingerprint FROM entries WHERE collection = ?")
                .bind(&self.collection)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| self.store_error(&e))?;

        Ok(rows.into_iter().collect())
    }

    /// Fingerprints stored for one source path. Used as the update-mode
    /// pre-filter.
    pub async fn source_fingerprints(
        &self,
        source_path: &str,
    ) -> Result<HashSet<String>, IngestError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT fingerprint FROM entries WHERE collection = ? AND source_path = ?",
        )
        .bind(&self.collection)
        .bind(source_path)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.store_error(&e))?;

        Ok(rows.into_iter().collect())
    }

    /// Write one document's embedded chunks under the given mode.
    ///
    /// All writes for the document happen in a single transaction: either
    /// every entry commits or none do. A fingerprint already written by an
    /// interrupted earlier run is a benign duplicate here, not an error.
    pub async fn reconcile_document(
        &self,
        source_path: &str,
        embedded: &[(ChunkRecord, Vec<f32>)],
        mode: UpdateMode,
        model: &str,
        dims: usize,
    ) -> Result<DocOutcome, IngestError> {
        let mut outcome = DocOutcome::default();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| self.store_error(&e))?;

        if mode == UpdateMode::Replace {
            let result = sqlx::query("DELETE FROM entries WHERE collection = ? AND source_path = ?")
                .bind(&self.collection)
                .bind(source_path)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.store_error(&e))?;
            outcome.deleted = result.rows_affected();
        }

        let sql = match mode {
            // Existing content wins; the insert quietly becomes a no-op.
            UpdateMode::Skip => {
                r#"
                INSERT INTO entries (collection, fingerprint, source_path, chunk_index,
                    start_offset, end_offset, mission, category, data_type,
                    content, embedding, model, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, fingerprint) DO NOTHING
                "#
            }
            // This document's version of the content wins.
            UpdateMode::Update | UpdateMode::Replace => {
                r#"
                INSERT INTO entries (collection, fingerprint, source_path, chunk_index,
                    start_offset, end_offset, mission, category, data_type,
                    content, embedding, model, dims, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, fingerprint) DO UPDATE SET
                    source_path = excluded.source_path,
                    chunk_index = excluded.chunk_index,
                    start_offset = excluded.start_offset,
                    end_offset = excluded.end_offset,
                    mission = excluded.mission,
                    category = excluded.category,
                    data_type = excluded.data_type,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    created_at = excluded.created_at
                "#
            }
        };

        for (record, vector) in embedded {
            let result = sqlx::query(sql)
                .bind(&self.collection)
                .bind(&record.fingerprint)
                .bind(&record.metadata.source_path)
                .bind(record.sequence_index as i64)
                .bind(record.start_offset as i64)
                .bind(record.end_offset as i64)
                .bind(record.metadata.mission.label())
                .bind(record.metadata.category.label())
                .bind(record.metadata.data_type.label())
                .bind(&record.content)
                .bind(vec_to_blob(vector))
                .bind(model)
                .bind(dims as i64)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.store_error(&e))?;

            if result.rows_affected() > 0 {
                outcome.added += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        tx.commit().await.map_err(|e| self.store_error(&e))?;
        Ok(outcome)
    }

    /// Total entries in this collection.
    pub async fn count(&self) -> Result<i64, IngestError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.store_error(&e))?;
        Ok(count)
    }

    /// Read-only aggregate view of the collection.
    pub async fn stats(&self) -> Result<IndexStats, IngestError> {
        let chunk_count = self.count().await?;

        let document_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT source_path) FROM entries WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| self.store_error(&e))?;

        let rows = sqlx::query(
            r#"
            SELECT mission, COUNT(DISTINCT source_path) AS documents, COUNT(*) AS chunks
            FROM entries
            WHERE collection = ?
            GROUP BY mission
            ORDER BY mission
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.store_error(&e))?;

        let mission_breakdown = rows
            .iter()
            .map(|row| MissionCount {
                mission: row.get("mission"),
                documents: row.get("documents"),
                chunks: row.get("chunks"),
            })
            .collect();

        Ok(IndexStats {
            document_count,
            chunk_count,
            mission_breakdown,
        })
    }

    /// Top-k entries ranked by cosine similarity to `vector`, optionally
    /// restricted to one mission.
    ///
    /// Ordering is deterministic: score desc, then fingerprint asc.
    pub async fn query(
        &self,
        vector: &[f32],
        k: usize,
        mission: Option<Mission>,
    ) -> Result<Vec<RetrievedChunk>, IngestError> {
        let rows = if let Some(m) = mission {
            sqlx::query(
                r#"
                SELECT fingerprint, source_path, chunk_index, mission, category, data_type,
                       content, embedding
                FROM entries
                WHERE collection = ? AND mission = ?
                "#,
            )
            .bind(&self.collection)
            .bind(m.label())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                SELECT fingerprint, source_path, chunk_index, mission, category, data_type,
                       content, embedding
                FROM entries
                WHERE collection = ?
                "#,
            )
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| self.store_error(&e))?;

        let mut results: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let mission_label: String = row.get("mission");
                let category_label: String = row.get("category");
                let data_type_label: String = row.get("data_type");
                let chunk_index: i64 = row.get("chunk_index");

                RetrievedChunk {
                    fingerprint: row.get("fingerprint"),
                    content: row.get("content"),
                    score: cosine_similarity(vector, &stored),
                    metadata: ChunkMetadata {
                        mission: Mission::from_label(&mission_label),
                        category: Category::from_label(&category_label),
                        data_type: DataType::from_label(&data_type_label),
                        source_path: row.get("source_path"),
                        chunk_index: chunk_index as usize,
                    },
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        results.truncate(k);

        Ok(results)
    }

    /// All collections present in the store, with their sizes.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IngestError> {
        let rows = sqlx::query(
            r#"
            SELECT collection, COUNT(DISTINCT source_path) AS documents, COUNT(*) AS chunks
            FROM entries
            GROUP BY collection
            ORDER BY collection
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.store_error(&e))?;

        Ok(rows
            .iter()
            .map(|row| CollectionInfo {
                name: row.get("collection"),
                document_count: row.get("documents"),
                chunk_count: row.get("chunks"),
            })
            .collect())
    }

    fn store_error(&self, err: &dyn std::fmt::Display) -> IngestError {
        IngestError::IndexUnavailable {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, CorpusConfig, IndexConfig};
    use sha2::{Digest, Sha256};
    use std::path::Path;

    fn test_config(dir: &Path) -> Config {
        Config {
            index: IndexConfig {
                path: dir.join("index.db"),
                collection: "test_collection".to_string(),
            },
            corpus: CorpusConfig {
                roots: vec![dir.to_path_buf()],
                extensions: vec!["txt".to_string()],
                exclude_globs: Vec::new(),
            },
            chunking: Default::default(),
            embedding: Default::default(),
            retrieval: Default::default(),
            answer: Default::default(),
        }
    }

    fn record(content: &str, source_path: &str, index: usize, mission: Mission) -> ChunkRecord {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        ChunkRecord {
            content: content.to_string(),
            start_offset: 0,
            end_offset: content.chars().count(),
            sequence_index: index,
            fingerprint: format!("{:x}", hasher.finalize()),
            metadata: ChunkMetadata {
                mission,
                category: Category::Transcript,
                data_type: DataType::Transcript,
                source_path: source_path.to_string(),
                chunk_index: index,
            },
        }
    }

    fn embedded(
        contents: &[(&str, Vec<f32>)],
        source_path: &str,
        mission: Mission,
    ) -> Vec<(ChunkRecord, Vec<f32>)> {
        contents
            .iter()
            .enumerate()
            .map(|(i, (content, vector))| (record(content, source_path, i, mission), vector.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_skip_mode_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path())).await.unwrap();

        let chunks = embedded(
            &[("one small step", vec![1.0, 0.0]), ("for man", vec![0.0, 1.0])],
            "apollo11/AS11_PAO.txt",
            Mission::Apollo11,
        );

        let first = index
            .reconcile_document("apollo11/AS11_PAO.txt", &chunks, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();
        assert_eq!(first.added, 2);
        assert_eq!(first.skipped, 0);

        let second = index
            .reconcile_document("apollo11/AS11_PAO.txt", &chunks, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_leaves_exactly_the_new_set() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path())).await.unwrap();

        let old = embedded(
            &[("old alpha", vec![1.0, 0.0]), ("old bravo", vec![0.0, 1.0])],
            "apollo13/log.txt",
            Mission::Apollo13,
        );
        index
            .reconcile_document("apollo13/log.txt", &old, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();

        let new = embedded(
            &[("new alpha", vec![1.0, 0.0])],
            "apollo13/log.txt",
            Mission::Apollo13,
        );
        let outcome = index
            .reconcile_document("apollo13/log.txt", &new, UpdateMode::Replace, "mock", 2)
            .await
            .unwrap();
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.added, 1);

        let remaining = index.source_fingerprints("apollo13/log.txt").await.unwrap();
        let expected: HashSet<String> = new.iter().map(|(r, _)| r.fingerprint.clone()).collect();
        assert_eq!(remaining, expected);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_mode_reassociates_moved_content() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path())).await.unwrap();

        let original = embedded(
            &[("shared content", vec![1.0, 0.0])],
            "old/location.txt",
            Mission::Unknown,
        );
        index
            .reconcile_document("old/location.txt", &original, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();

        let moved = embedded(
            &[("shared content", vec![1.0, 0.0])],
            "apollo11/location.txt",
            Mission::Apollo11,
        );
        index
            .reconcile_document("apollo11/location.txt", &moved, UpdateMode::Update, "mock", 2)
            .await
            .unwrap();

        // Same fingerprint, so still one entry, now owned by the new path.
        assert_eq!(index.count().await.unwrap(), 1);
        let under_new = index
            .source_fingerprints("apollo11/location.txt")
            .await
            .unwrap();
        assert_eq!(under_new.len(), 1);
        let under_old = index.source_fingerprints("old/location.txt").await.unwrap();
        assert!(under_old.is_empty());
    }

    #[tokio::test]
    async fn test_stats_aggregates_by_mission() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path())).await.unwrap();

        let apollo = embedded(
            &[("go for landing", vec![1.0, 0.0]), ("eagle has landed", vec![0.0, 1.0])],
            "apollo11/AS11_TEC.txt",
            Mission::Apollo11,
        );
        index
            .reconcile_document("apollo11/AS11_TEC.txt", &apollo, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();

        let challenger = embedded(
            &[("go at throttle up", vec![0.5, 0.5])],
            "challenger/51L.txt",
            Mission::Challenger,
        );
        index
            .reconcile_document("challenger/51L.txt", &challenger, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.mission_breakdown.len(), 2);
        // GROUP BY ... ORDER BY mission: apollo_11 before challenger
        assert_eq!(stats.mission_breakdown[0].mission, "apollo_11");
        assert_eq!(stats.mission_breakdown[0].chunks, 2);
        assert_eq!(stats.mission_breakdown[1].mission, "challenger");
        assert_eq!(stats.mission_breakdown[1].documents, 1);
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity_and_filters_mission() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(&test_config(dir.path())).await.unwrap();

        let apollo = embedded(
            &[
                ("tranquility base", vec![1.0, 0.0, 0.0]),
                ("crater observation", vec![0.9, 0.1, 0.0]),
            ],
            "apollo11/AS11_TEC.txt",
            Mission::Apollo11,
        );
        index
            .reconcile_document("apollo11/AS11_TEC.txt", &apollo, UpdateMode::Skip, "mock", 3)
            .await
            .unwrap();

        let challenger = embedded(
            &[("booster telemetry", vec![0.0, 1.0, 0.0])],
            "challenger/51L.txt",
            Mission::Challenger,
        );
        index
            .reconcile_document("challenger/51L.txt", &challenger, UpdateMode::Skip, "mock", 3)
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "tranquility base");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[1].content, "crater observation");
        assert!(results[0].score >= results[1].score);

        let filtered = index
            .query(&[1.0, 0.0, 0.0], 5, Some(Mission::Challenger))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].metadata.mission, Mission::Challenger);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        let first = VectorIndex::open(&config).await.unwrap();

        let chunks = embedded(
            &[("same content", vec![1.0, 0.0])],
            "doc.txt",
            Mission::Unknown,
        );
        first
            .reconcile_document("doc.txt", &chunks, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();

        config.index.collection = "other_collection".to_string();
        let second = VectorIndex::open(&config).await.unwrap();
        second
            .reconcile_document("doc.txt", &chunks, UpdateMode::Skip, "mock", 2)
            .await
            .unwrap();

        assert_eq!(first.count().await.unwrap(), 1);
        assert_eq!(second.count().await.unwrap(), 1);

        let collections = second.list_collections().await.unwrap();
        let names: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["other_collection", "test_collection"]);
    }
}
