
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// Configuration for positional text chunking
///
/// Both sizes are measured in characters (Unicode scalar values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum length of a chunk
    pub chunk_size: usize,
    /// Number of characters shared with the previous chunk
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// A window over the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// Char offset of the first character in the source text
    pub start: usize,
    /// Char offset one past the last character
    pub end: usize,
    /// The untrimmed window, as sent to the embedding model
    pub raw: &'a str,
    /// The window with surrounding whitespace removed, as stored in metadata
    pub text: &'a str,
}

impl TextChunk<'_> {
    /// Length of the untrimmed window in characters
    #[inline]
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Lazy iterator over the overlapping windows of a text
///
/// Every window but the last spans `chunk_size` characters. Each following
/// window starts at `max(end - overlap, start + 1)`, so iteration always makes
/// progress, even when `overlap >= chunk_size`. Iteration stops after the first
/// window that reaches the end of the text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every char, followed by `text.len()`
    boundaries: Vec<usize>,
    chunk_size: usize,
    overlap: usize,
    next_start: Option<usize>,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str, config: &ChunkingConfig) -> Self {
        let next_start = (!text.trim().is_empty()).then_some(0);
        let boundaries = if next_start.is_some() {
            text.char_indices()
                .map(|(offset, _)| offset)
                .chain(std::iter::once(text.len()))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            text,
            boundaries,
            chunk_size: config.chunk_size.max(1),
            overlap: config.overlap,
            next_start,
        }
    }

    fn char_count(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.text
            .get(self.boundaries[start]..self.boundaries[end])
            .unwrap_or_default()
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let len = self.char_count();
        let end = start + self.chunk_size;
        let slice_end = end.min(len);

        self.next_start = if end >= len {
            None
        } else {
            Some(end.saturating_sub(self.overlap).max(start + 1))
        };

        let raw = self.slice(start, slice_end);
        Some(TextChunk {
            start,
            end: slice_end,
            raw,
            text: raw.trim(),
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next_start {
            None => (0, Some(0)),
            Some(start) => (1, Some(self.char_count() - start)),
        }
    }
}

impl FusedIterator for Chunks<'_> {}

/// Split `text` into overlapping windows according to `config`
///
/// Empty and whitespace-only texts yield no chunks.
#[inline]
pub fn chunk_text<'a>(text: &'a str, config: &ChunkingConfig) -> Chunks<'a> {
    Chunks::new(text, config)
}
