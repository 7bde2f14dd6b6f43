//! Index statistics and corpus health overview.
//!
//! Provides a quick summary of what's indexed: document counts, chunk counts,
//! and the per-mission breakdown. Used by `apg stats` to give confidence that
//! ingestion runs landed what they were supposed to.

use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::VectorIndex;
use crate::metadata::title_case;

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let index = VectorIndex::open(config).await?;
    let stats = index.stats().await?;

    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Apogee — Index Stats");
    println!("====================");
    println!();
    println!("  Store:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", index.collection());
    println!();
    println!("  Documents:   {}", stats.document_count);
    println!("  Chunks:      {}", stats.chunk_count);

    if !stats.mission_breakdown.is_empty() {
        println!();
        println!("  By mission:");
        println!("  {:<24} {:>8} {:>8}", "MISSION", "DOCS", "CHUNKS");
        println!("  {}", "-".repeat(42));
        for m in &stats.mission_breakdown {
            println!(
                "  {:<24} {:>8} {:>8}",
                title_case(&m.mission),
                m.documents,
                m.chunks
            );
        }
    }

    println!();

    index.close().await;
    Ok(())
}

/// List every collection stored in the index file.
pub async fn run_collections(config: &Config) -> Result<()> {
    let index = VectorIndex::open(config).await?;
    let collections = index.list_collections().await?;

    if collections.is_empty() {
        println!("No collections.");
    } else {
        println!("{:<24} {:>10} {:>10}", "COLLECTION", "DOCS", "CHUNKS");
        for c in &collections {
            println!(
                "{:<24} {:>10} {:>10}",
                c.name, c.document_count, c.chunk_count
            );
        }
    }

    index.close().await;
    Ok(())
}

/// Check each configured corpus root and report how many ingestible files
/// it holds. Missing roots are flagged rather than treated as errors.
pub fn run_sources(config: &Config) -> Result<()> {
    println!("{:<44} {:<10} {:>8}", "ROOT", "STATUS", "FILES");

    for root in &config.corpus.roots {
        let label = root.display().to_string();
        if !root.is_dir() {
            println!("{:<44} {:<10} {:>8}", label, "MISSING", "-");
            continue;
        }
        let files = count_corpus_files(root, &config.corpus.extensions);
        println!("{:<44} {:<10} {:>8}", label, "OK", files);
    }

    Ok(())
}

fn count_corpus_files(root: &Path, extensions: &[String]) -> usize {
    let allowed: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| allowed.iter().any(|a| a == &e.to_lowercase()))
                .unwrap_or(false)
        })
        .count()
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
