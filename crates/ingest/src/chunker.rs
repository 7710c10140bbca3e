use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::chunk::Chunk;

/// Sentence terminator followed by the whitespace that separates it from the next sentence.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters.
    pub max_length: usize,
    /// Inputs at or below this many characters are not split at all.
    pub chunk_threshold: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_length: 12_000,
            chunk_threshold: 12_000,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a document. Short inputs come back as a single chunk.
    pub fn chunk_text(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let total_chars = text.chars().count();
        if total_chars <= self.config.chunk_threshold {
            return vec![Chunk::new(
                doc_id.to_string(),
                0,
                text.to_string(),
                (0, total_chars),
            )];
        }

        let chunks: Vec<Chunk> = sentence_aligned_ranges(text, self.config.max_length)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                let char_start = text[..start].chars().count();
                let piece = &text[start..end];
                let char_end = char_start + piece.chars().count();
                Chunk::new(doc_id.to_string(), index, piece.to_string(), (char_start, char_end))
            })
            .collect();

        tracing::debug!(
            doc_id = doc_id,
            chars = total_chars,
            chunks = chunks.len(),
            "Split long input into chunks"
        );

        chunks
    }
}

/// Split `text` into sentence-aligned chunks of at most `max_length` characters.
///
/// A sentence longer than `max_length` becomes a chunk of its own.
pub fn split_text_into_chunks(text: &str, max_length: usize) -> Vec<String> {
    sentence_aligned_ranges(text, max_length)
        .into_iter()
        .map(|(start, end)| text[start..end].to_string())
        .collect()
}

/// Byte ranges of the trimmed sentences in `text`.
fn sentence_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut raw = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        // The terminator is ASCII, so the sentence ends one byte into the match.
        raw.push((start, m.start() + 1));
        start = m.end();
    }
    raw.push((start, text.len()));

    raw.into_iter()
        .filter_map(|(start, end)| {
            let slice = &text[start..end];
            let trimmed_start = start + (slice.len() - slice.trim_start().len());
            let trimmed_end = end - (slice.len() - slice.trim_end().len());
            (trimmed_start < trimmed_end).then_some((trimmed_start, trimmed_end))
        })
        .collect()
}

/// Greedily pack sentences into ranges, keeping the original whitespace between them.
fn sentence_aligned_ranges(text: &str, max_length: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut current_chars = 0;

    for (start, end) in sentence_ranges(text) {
        let sentence_chars = text[start..end].chars().count();

        match current {
            None => {
                current = Some((start, end));
                current_chars = sentence_chars;
            }
            Some((chunk_start, chunk_end)) => {
                let gap_chars = text[chunk_end..start].chars().count();
                if current_chars + gap_chars + sentence_chars > max_length {
                    ranges.push((chunk_start, chunk_end));
                    current = Some((start, end));
                    current_chars = sentence_chars;
                } else {
                    current = Some((chunk_start, end));
                    current_chars += gap_chars + sentence_chars;
                }
            }
        }
    }

    if let Some(range) = current {
        ranges.push(range);
    }

    ranges
}
