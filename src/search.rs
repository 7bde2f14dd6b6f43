//! Semantic search over the vector index.

use anyhow::Result;

use crate::config::Config;
use crate::embedder::{create_client, embed_query, EmbeddingClient};
use crate::index::VectorIndex;
use crate::metadata::{title_case, Mission};
use crate::models::RetrievedChunk;

/// Embed the query and return the top-k nearest chunks, optionally
/// restricted to one mission.
pub async fn retrieve(
    index: &VectorIndex,
    client: &dyn EmbeddingClient,
    query: &str,
    mission: Option<Mission>,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>> {
    let query_vec = embed_query(client, query).await?;
    Ok(index.query(&query_vec, top_k, mission).await?)
}

pub async fn run_search(
    config: &Config,
    query: &str,
    mission_raw: Option<&str>,
    top_k: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let mission = mission_raw.and_then(Mission::parse_filter);
    let k = top_k.unwrap_or(config.retrieval.top_k);

    let index = VectorIndex::open(config).await?;
    let client = create_client(&config.embedding)?;

    let results = retrieve(&index, client.as_ref(), query, mission, k).await?;

    if results.is_empty() {
        println!("No results.");
        index.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} | {} | {}",
            i + 1,
            result.score,
            title_case(result.metadata.mission.label()),
            title_case(result.metadata.category.label()),
            result.metadata.source_path
        );
        println!("    excerpt: \"{}\"", excerpt(&result.content, 240));
        println!();
    }

    index.close().await;
    Ok(())
}

/// Flatten a chunk to a single display line, capped at `max_chars`.
fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    let trimmed = flat.trim();
    let mut out: String = trimmed.chars().take(max_chars).collect();
    if trimmed.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_caps() {
        assert_eq!(excerpt("one\ntwo", 240), "one two");
        assert_eq!(excerpt("  padded  ", 240), "padded");
        let long = "x".repeat(300);
        let capped = excerpt(&long, 240);
        assert_eq!(capped.chars().count(), 243);
        assert!(capped.ends_with("..."));
    }
}
