//! Text chunking with configurable size, overlap and boundary preference.
//!
//! Sizes are counted in characters, offsets are byte offsets. Each chunk is
//! an exact substring of its document, so consecutive chunk starts always
//! partition the text.
//!
//! The default paragraph preference hands the whole cascade (blank lines,
//! line breaks, sentences, words, graphemes) to `text-splitter`. The
//! sentence, word and hard preferences skip the upper levels, which
//! `text-splitter` cannot do, so they pack windows here on the bounds
//! `unicode-segmentation` reports.

use crate::types::Chunk;
use electro_core::config::ChunkingConfig;
use electro_core::ChunkBoundary;
use text_splitter::{ChunkConfig, TextSplitter};
use unicode_segmentation::UnicodeSegmentation;

/// Split a document into overlapping chunks.
///
/// Empty or whitespace-only text yields no chunks. Callers are expected to
/// pass a validated config (`chunk_size > 0`, `chunk_overlap < chunk_size`);
/// an out-of-range overlap is clamped.
pub fn split(document_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() || config.chunk_size == 0 {
        return Vec::new();
    }

    let size = config.chunk_size;
    let overlap = config.chunk_overlap.min(size - 1);

    let spans = match config.boundary {
        ChunkBoundary::Paragraph => semantic_spans(text, size, overlap),
        ChunkBoundary::Sentence => {
            let tiers = [sentence_cuts(text), line_cuts(text), word_cuts(text)];
            packed_spans(text, &tiers, size, overlap)
        }
        ChunkBoundary::Word => packed_spans(text, &[word_cuts(text)], size, overlap),
        ChunkBoundary::Hard => packed_spans(text, &[], size, overlap),
    };

    let chunks: Vec<Chunk> = spans
        .into_iter()
        .enumerate()
        .map(|(position, (start, end))| Chunk {
            document_id: document_id.to_string(),
            position,
            start,
            text: text[start..end].to_string(),
        })
        .collect();

    tracing::trace!(
        document = document_id,
        chunks = chunks.len(),
        "Split document"
    );

    chunks
}

/// Byte spans from `text-splitter` with whitespace kept, so the spans
/// cover the whole text.
fn semantic_spans(text: &str, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let chunk_config = match ChunkConfig::new(size).with_overlap(overlap) {
        Ok(chunk_config) => chunk_config,
        Err(e) => {
            tracing::warn!(size, overlap, error = %e, "Chunk overlap rejected, splitting without it");
            ChunkConfig::new(size)
        }
    };

    TextSplitter::new(chunk_config.with_trim(false))
        .chunk_indices(text)
        .map(|(start, chunk)| (start, start + chunk.len()))
        .collect()
}

/// Byte offsets where sentences start, excluding 0.
fn sentence_cuts(text: &str) -> Vec<usize> {
    text.split_sentence_bound_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .collect()
}

/// Byte offsets just past each line break.
fn line_cuts(text: &str) -> Vec<usize> {
    text.match_indices('\n').map(|(i, _)| i + 1).collect()
}

/// Byte offsets where non-whitespace word segments start, excluding 0.
fn word_cuts(text: &str) -> Vec<usize> {
    text.split_word_bound_indices()
        .filter(|(i, segment)| *i > 0 && !segment.chars().all(char::is_whitespace))
        .map(|(i, _)| i)
        .collect()
}

/// Greedy windows of at most `size` characters.
///
/// Each window ends at the last cut in its second half, taken from the first
/// tier that has one, or hard at `size` characters when none does. The next
/// window starts `overlap` characters before the end, moved forward to a
/// word start when the overlap holds one.
fn packed_spans(text: &str, tiers: &[Vec<usize>], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = chars.len();

    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        if total - start <= size {
            spans.push((offsets[start], text.len()));
            return spans;
        }

        let min_cut = offsets[start + size / 2];
        let max_cut = offsets[start + size];
        let cut = tiers
            .iter()
            .find_map(|cuts| last_cut_within(cuts, min_cut, max_cut))
            .map(|c| offsets.partition_point(|&o| o < c))
            .unwrap_or(start + size);

        spans.push((offsets[start], offsets[cut]));

        let from = cut.saturating_sub(overlap).max(start + 1);
        start = snap_to_word_start(&chars, from, cut);
    }
}

/// Largest cut in `(min_cut, max_cut]`; `cuts` is sorted.
fn last_cut_within(cuts: &[usize], min_cut: usize, max_cut: usize) -> Option<usize> {
    let end = cuts.partition_point(|&c| c <= max_cut);
    end.checked_sub(1)
        .map(|i| cuts[i])
        .filter(|&c| c > min_cut)
}

/// First word start in `from..cut`, or `from` when the region has none.
fn snap_to_word_start(chars: &[char], from: usize, cut: usize) -> usize {
    (from..cut)
        .find(|&i| {
            !chars[i].is_whitespace() && (i == 0 || chars[i - 1].is_whitespace())
        })
        .unwrap_or(from)
}
