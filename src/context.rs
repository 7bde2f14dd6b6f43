//! Assembles retrieved chunks into the document context block handed to
//! the answer model.

use std::collections::HashSet;

use crate::metadata::title_case;
use crate::models::RetrievedChunk;

const CONTEXT_HEADER: &str = "=== RELEVANT NASA MISSION DOCUMENTS ===";
const CONTEXT_FOOTER: &str = "=== END OF DOCUMENTS ===";

/// Overlapping retrieval often returns near-identical chunks; the first
/// 200 characters are enough of a signature to collapse them.
const DEDUP_SIGNATURE_CHARS: usize = 200;

/// Format retrieved chunks into a numbered, deduplicated context block.
///
/// Source numbers follow retrieval rank, so a collapsed duplicate leaves a
/// gap rather than renumbering later sources. Each body is capped at
/// `max_chunk_chars` characters.
pub fn format_context(chunks: &[RetrievedChunk], max_chunk_chars: usize) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut sections: Vec<String> = Vec::new();

    for (rank, chunk) in chunks.iter().enumerate() {
        let signature: String = chunk.content.chars().take(DEDUP_SIGNATURE_CHARS).collect();
        if !seen.insert(signature) {
            continue;
        }

        let header = format!(
            "--- Source {}: {} | {} | {} ---",
            rank + 1,
            title_case(chunk.metadata.mission.label()),
            title_case(chunk.metadata.category.label()),
            chunk.metadata.source_path
        );
        sections.push(format!(
            "{}\n{}",
            header,
            truncate_chars(&chunk.content, max_chunk_chars)
        ));
    }

    format!(
        "{}\n\n{}\n\n{}",
        CONTEXT_HEADER,
        sections.join("\n\n"),
        CONTEXT_FOOTER
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...[truncated]", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Category, DataType, Mission};
    use crate::models::ChunkMetadata;

    fn chunk(content: &str, mission: Mission, source_path: &str) -> RetrievedChunk {
        RetrievedChunk {
            fingerprint: format!("fp-{}", source_path),
            content: content.to_string(),
            score: 0.9,
            metadata: ChunkMetadata {
                mission,
                category: Category::Technical,
                data_type: DataType::Document,
                source_path: source_path.to_string(),
                chunk_index: 0,
            },
        }
    }

    #[test]
    fn test_empty_input_yields_empty_context() {
        assert_eq!(format_context(&[], 2000), "");
    }

    #[test]
    fn test_headers_and_titlecased_labels() {
        let chunks = vec![chunk(
            "Houston, we've had a problem.",
            Mission::Apollo13,
            "apollo13/AS13_TEC.txt",
        )];
        let context = format_context(&chunks, 2000);

        assert!(context.starts_with("=== RELEVANT NASA MISSION DOCUMENTS ==="));
        assert!(context.ends_with("=== END OF DOCUMENTS ==="));
        assert!(context.contains("--- Source 1: Apollo 13 | Technical | apollo13/AS13_TEC.txt ---"));
        assert!(context.contains("Houston, we've had a problem."));
    }

    #[test]
    fn test_duplicates_collapse_and_keep_rank_numbers() {
        let shared = "identical lead-in ".repeat(20);
        let chunks = vec![
            chunk(&shared, Mission::Apollo11, "a.txt"),
            chunk(&shared, Mission::Apollo11, "b.txt"),
            chunk("a different chunk entirely", Mission::Challenger, "c.txt"),
        ];
        let context = format_context(&chunks, 2000);

        assert!(context.contains("--- Source 1:"));
        assert!(!context.contains("--- Source 2:"));
        assert!(context.contains("--- Source 3:"));
    }

    #[test]
    fn test_long_chunks_are_truncated() {
        let long = "x".repeat(2500);
        let chunks = vec![chunk(&long, Mission::Unknown, "long.txt")];
        let context = format_context(&chunks, 2000);

        assert!(context.contains("...[truncated]"));
        assert!(!context.contains(&"x".repeat(2001)));
    }
}
