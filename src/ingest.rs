//! Ingestion pipeline orchestration.
//!
//! Coordinates the full run: scan → chunk + classify → mode pre-filter →
//! batch embed → reconcile into the index. All accounting flows through an
//! explicit [`ReconcileReport`] threaded along the run; nothing is mutated
//! globally. Per-file and per-batch failures are recorded in the report,
//! configuration and index-availability problems abort before any work.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::chunker;
use crate::config::Config;
use crate::embedder::{create_client, BatchEmbedder, EmbeddingClient};
use crate::error::IngestError;
use crate::index::VectorIndex;
use crate::models::{ChunkRecord, FailurePolicy, ReconcileReport, UpdateMode};
use crate::progress::{IngestProgressEvent, ProgressMode, ProgressReporter};
use crate::scanner::CorpusScanner;

pub fn parse_mode(raw: &str) -> Result<UpdateMode> {
    match raw {
        "skip" => Ok(UpdateMode::Skip),
        "update" => Ok(UpdateMode::Update),
        "replace" => Ok(UpdateMode::Replace),
        other => bail!("Unknown update mode: {}. Use skip, update, or replace.", other),
    }
}

/// Run the full ingestion pipeline over the configured corpus roots.
///
/// Returns the accumulated report; an empty `errors` list means a clean
/// run. Fatal preconditions (bad configuration, unavailable index) and,
/// under [`FailurePolicy::Abort`], the first failed batch surface as `Err`.
pub async fn ingest_corpus(
    config: &Config,
    index: &VectorIndex,
    client: &dyn EmbeddingClient,
    mode: UpdateMode,
    policy: FailurePolicy,
    progress: &dyn ProgressReporter,
) -> Result<ReconcileReport, IngestError> {
    let scanner =
        CorpusScanner::new(&config.corpus).map_err(|e| IngestError::InvalidConfiguration {
            reason: e.to_string(),
        })?;
    let embedder = BatchEmbedder::new(
        client,
        config.embedding.batch_size,
        config.embedding.max_retries,
    );

    let mut report = ReconcileReport::default();

    // Skip mode filters against every fingerprint in the collection; the
    // set is fetched once and extended as the run inserts new entries.
    let mut collection_seen: HashSet<String> = if mode == UpdateMode::Skip {
        index.collection_fingerprints().await?
    } else {
        HashSet::new()
    };

    for root in &config.corpus.roots {
        progress.report(IngestProgressEvent::Scanning {
            root: root.display().to_string(),
        });
    }

    for item in scanner.scan() {
        let doc = match item {
            Ok(doc) => doc,
            Err(IngestError::UnreadableDocument { path, reason }) => {
                tracing::warn!("skipping unreadable document {}: {}", path.display(), reason);
                report.record_failure(path.display().to_string(), reason);
                continue;
            }
            Err(other) => return Err(other),
        };

        report.documents_seen += 1;

        let spans = chunker::chunk(
            &doc.text,
            config.chunking.chunk_size,
            config.chunking.overlap,
            config.chunking.min_chunk,
        )?;
        report.chunks_seen += spans.len() as u64;

        let mut records: Vec<ChunkRecord> = spans
            .into_iter()
            .map(|span| ChunkRecord::from_span(span, &doc.source_path, doc.tags))
            .collect();

        // Overlapping windows over repetitive text can cut identical
        // spans; one copy per document suffices.
        let mut in_doc = HashSet::new();
        let before = records.len();
        records.retain(|r| in_doc.insert(r.fingerprint.clone()));
        report.skipped += (before - records.len()) as u64;

        // Pre-filter: don't embed chunks the mode would not write anyway.
        let (to_embed, pre_skipped): (Vec<ChunkRecord>, Vec<ChunkRecord>) = match mode {
            UpdateMode::Replace => (records, Vec::new()),
            UpdateMode::Skip => records
                .into_iter()
                .partition(|r| !collection_seen.contains(&r.fingerprint)),
            UpdateMode::Update => {
                let own = index.source_fingerprints(&doc.source_path).await?;
                records
                    .into_iter()
                    .partition(|r| !own.contains(&r.fingerprint))
            }
        };
        report.skipped += pre_skipped.len() as u64;

        // Replace must still run on an empty set to clear stale entries.
        if to_embed.is_empty() && mode != UpdateMode::Replace {
            continue;
        }

        let outcome = embedder
            .embed_chunks(to_embed, policy, progress, &doc.source_path)
            .await?;
        report.embedded += outcome.embedded.len() as u64;
        for failure in outcome.failed_batches {
            report.record_failure(&doc.source_path, failure.to_string());
        }

        let doc_outcome = index
            .reconcile_document(
                &doc.source_path,
                &outcome.embedded,
                mode,
                client.model_name(),
                client.dims(),
            )
            .await?;
        report.added += doc_outcome.added;
        report.skipped += doc_outcome.skipped;
        report.deleted += doc_outcome.deleted;

        if mode == UpdateMode::Skip {
            for (record, _) in &outcome.embedded {
                collection_seen.insert(record.fingerprint.clone());
            }
        }
    }

    Ok(report)
}

/// CLI entry point for `apg ingest`.
pub async fn run_ingest(
    config: &Config,
    mode_raw: &str,
    dry_run: bool,
    keep_going: bool,
    progress_mode: ProgressMode,
) -> Result<()> {
    let mode = parse_mode(mode_raw)?;

    if dry_run {
        return dry_run_report(config, mode);
    }

    let index = VectorIndex::open(config).await?;
    let client = create_client(&config.embedding)?;
    let policy = if keep_going {
        FailurePolicy::SkipBatch
    } else {
        FailurePolicy::Abort
    };
    let reporter = progress_mode.reporter();

    let report = ingest_corpus(
        config,
        &index,
        client.as_ref(),
        mode,
        policy,
        reporter.as_ref(),
    )
    .await?;

    println!("ingest {} ({})", index.collection(), mode.as_str());
    println!("  documents: {}", report.documents_seen);
    println!("  chunks: {}", report.chunks_seen);
    println!("  embedded: {}", report.embedded);
    println!("  added: {}", report.added);
    println!("  skipped: {}", report.skipped);
    if mode == UpdateMode::Replace {
        println!("  deleted: {}", report.deleted);
    }
    if !report.is_clean() {
        println!("  errors: {}", report.errors.len());
        for failure in &report.errors {
            println!("    {}: {}", failure.path, failure.reason);
        }
    }

    index.close().await;

    if !report.is_clean() {
        bail!("{} error(s) during ingestion", report.errors.len());
    }
    println!("ok");
    Ok(())
}

fn dry_run_report(config: &Config, mode: UpdateMode) -> Result<()> {
    let scanner = CorpusScanner::new(&config.corpus)?;
    let mut documents = 0usize;
    let mut chunks = 0usize;
    let mut unreadable = 0usize;

    for item in scanner.scan() {
        match item {
            Ok(doc) => {
                documents += 1;
                chunks += chunker::chunk(
                    &doc.text,
                    config.chunking.chunk_size,
                    config.chunking.overlap,
                    config.chunking.min_chunk,
                )?
                .len();
            }
            Err(_) => unreadable += 1,
        }
    }

    println!("ingest (dry-run, mode {})", mode.as_str());
    println!("  documents found: {}", documents);
    println!("  estimated chunks: {}", chunks);
    if unreadable > 0 {
        println!("  unreadable files: {}", unreadable);
    }
    Ok(())
}
