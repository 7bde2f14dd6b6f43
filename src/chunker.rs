//! Sentence-boundary text chunker.
//!
//! Splits document text into overlapping windows of a configured size,
//! preferring to end each window at a sentence terminator (`.`, `!`, `?`)
//! found in its trailing 100 characters. A boundary is honored only when it
//! falls in the back half of the window, so no interior chunk drops below
//! half the target size. The next window starts `overlap` characters before
//! the actual end of the previous chunk, so overlap is measured from real
//! boundaries, not nominal ones.
//!
//! Offsets are character positions. Each span carries a SHA-256 hex digest
//! of its content, the identity used for dedup and update decisions.

use sha2::{Digest, Sha256};

use crate::error::IngestError;
use crate::models::ChunkSpan;

/// How far back from the window end to look for a sentence terminator.
const BOUNDARY_SEARCH_CHARS: usize = 100;

/// Split `text` into overlapping chunk spans.
///
/// Windows advance by `size - overlap` nominally, adjusted to actual chunk
/// boundaries. The final remainder is emitted as one last chunk with no
/// lower bound on its length. Empty input produces no chunks.
///
/// Fails with [`IngestError::InvalidConfiguration`] when `size` is zero or
/// `overlap >= size`.
pub fn chunk(
    text: &str,
    size: usize,
    overlap: usize,
    min_chunk: usize,
) -> Result<Vec<ChunkSpan>, IngestError> {
    if size == 0 {
        return Err(IngestError::InvalidConfiguration {
            reason: "chunk size must be > 0".to_string(),
        });
    }
    if overlap >= size {
        return Err(IngestError::InvalidConfiguration {
            reason: format!("overlap ({}) must be smaller than chunk size ({})", overlap, size),
        });
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut spans = Vec::new();
    let mut start = 0usize;

    // Full windows. The loop leaves the tail (≤ size chars) for the final
    // remainder below.
    while total - start > size {
        let window_end = start + size;
        let end = adjust_to_boundary(&chars, start, window_end);
        spans.push(make_span(&chars, start, end, spans.len()));

        let mut next = end.saturating_sub(overlap);
        if next <= start {
            // Boundary truncation plus a large overlap can stall the
            // window; force progress without exceeding the overlap bound.
            next = start + 1;
        }
        start = next;

        if total - start < min_chunk {
            break;
        }
    }

    if start < total {
        spans.push(make_span(&chars, start, total, spans.len()));
    }

    Ok(spans)
}

/// Truncate a full window at the last sentence terminator in its trailing
/// characters, if that leaves more than half the window intact. Returns the
/// exclusive end position (terminator included in the chunk).
fn adjust_to_boundary(chars: &[char], start: usize, window_end: usize) -> usize {
    let search_from = window_end.saturating_sub(BOUNDARY_SEARCH_CHARS).max(start);

    for pos in (search_from..window_end).rev() {
        if matches!(chars[pos], '.' | '!' | '?') {
            let end = pos + 1;
            if end - start > (window_end - start) / 2 {
                return end;
            }
            break;
        }
    }

    window_end
}

fn make_span(chars: &[char], start: usize, end: usize, sequence_index: usize) -> ChunkSpan {
    let content: String = chars[start..end].iter().collect();
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let fingerprint = format!("{:x}", hasher.finalize());

    ChunkSpan {
        content,
        start_offset: start,
        end_offset: end,
        sequence_index,
        fingerprint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_text(len: usize) -> String {
        // No sentence terminators anywhere.
        "abcdefghij".chars().cycle().take(len).collect()
    }

    #[test]
    fn test_fixed_windows_without_terminators() {
        let text = flat_text(1150);
        let spans = chunk(&text, 500, 100, 100).unwrap();

        assert_eq!(spans.len(), 3);
        assert_eq!((spans[0].start_offset, spans[0].end_offset), (0, 500));
        assert_eq!((spans[1].start_offset, spans[1].end_offset), (400, 900));
        assert_eq!((spans[2].start_offset, spans[2].end_offset), (800, 1150));
        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.sequence_index, i);
        }
    }

    #[test]
    fn test_deterministic_fingerprints() {
        let text = "One small step. ".repeat(200);
        let a = chunk(&text, 500, 100, 100).unwrap();
        let b = chunk(&text, 500, 100, 100).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.fingerprint, y.fingerprint);
            assert_eq!(x.content, y.content);
            assert_eq!(x.start_offset, y.start_offset);
        }
    }

    #[test]
    fn test_overlap_and_size_bounds() {
        let text = "Go for landing. Stand by for readback. Copy that, Houston! Roger. ".repeat(60);
        let size = 500;
        let overlap = 100;
        let spans = chunk(&text, size, overlap, 100).unwrap();

        assert!(spans.len() > 2);
        for span in &spans {
            assert!(span.end_offset - span.start_offset <= size);
        }
        for pair in spans.windows(2) {
            assert!(pair[0].end_offset > pair[1].start_offset || overlap == 0);
            assert!(pair[0].end_offset - pair[1].start_offset <= overlap);
        }
    }

    #[test]
    fn test_boundary_in_trailing_window_truncates() {
        // Terminator at position 449: inside the trailing 100 chars of the
        // first window and past its midpoint.
        let mut text = flat_text(600);
        text.replace_range(449..450, ".");
        let spans = chunk(&text, 500, 100, 100).unwrap();

        assert_eq!(spans[0].end_offset, 450);
        assert!(spans[0].content.ends_with('.'));
        assert_eq!(spans[1].start_offset, 350);
    }

    #[test]
    fn test_boundary_before_midpoint_keeps_full_window() {
        // Window of 150: the trailing search reaches back to position 50,
        // but a terminator at 60 would cut the chunk below half the window.
        let mut text = flat_text(300);
        text.replace_range(60..61, ".");
        let spans = chunk(&text, 150, 20, 10).unwrap();

        assert_eq!(spans[0].end_offset, 150);
    }

    #[test]
    fn test_terminator_outside_search_window_ignored() {
        let mut text = flat_text(1150);
        text.replace_range(200..201, ".");
        let spans = chunk(&text, 500, 100, 100).unwrap();

        assert_eq!(spans[0].end_offset, 500);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let spans = chunk("Tranquility Base here.", 500, 100, 100).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_offset, 0);
        assert_eq!(spans[0].end_offset, 22);
    }

    #[test]
    fn test_small_remainder_still_emitted() {
        let text = flat_text(520);
        let spans = chunk(&text, 500, 0, 100).unwrap();

        assert_eq!(spans.len(), 2);
        assert_eq!((spans[1].start_offset, spans[1].end_offset), (500, 520));
    }

    #[test]
    fn test_empty_text_no_chunks() {
        let spans = chunk("", 500, 100, 100).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_offsets_are_character_positions() {
        let text: String = "é".repeat(600);
        let spans = chunk(&text, 500, 100, 100).unwrap();

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].content.chars().count(), 500);
        assert_eq!((spans[1].start_offset, spans[1].end_offset), (400, 600));
    }

    #[test]
    fn test_rejects_zero_size() {
        let err = chunk("text", 0, 0, 0).unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = chunk("text", 100, 100, 10).unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfiguration { .. }));
        let err = chunk("text", 100, 150, 10).unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_progress_with_aggressive_overlap() {
        // Large overlap with boundary truncation must still advance.
        let mut text = flat_text(2000);
        for pos in (260..2000).step_by(270) {
            text.replace_range(pos..pos + 1, ".");
        }
        let spans = chunk(&text, 500, 400, 100).unwrap();

        for pair in spans.windows(2) {
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
        assert_eq!(spans.last().unwrap().end_offset, 2000);
    }
}
