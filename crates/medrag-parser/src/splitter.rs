//! Sliding-window text splitter
//!
//! Sizes and offsets are counted in characters (Unicode scalar values),
//! never bytes, so multi-byte text is never cut mid-character.

use medrag_core::{ChunkMetadata, DocumentChunk, RagConfig, RagError};

use crate::{LoadedDocument, PageBlock};

/// A `[start, end)` character range within a block of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Deterministic splitter producing overlapping windows of text
///
/// Every window is at most `chunk_size` characters. A window ends at a
/// line break or whitespace when one exists in its back half. Consecutive
/// windows share at least `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter; requires `0 < chunk_overlap + 1 <= chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::ValidationError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ValidationError(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Create from config
    pub fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute window spans over `text`
    pub fn spans(&self, text: &str) -> Vec<Span> {
        let chars: Vec<char> = text.chars().collect();
        self.spans_of(&chars)
    }

    fn spans_of(&self, chars: &[char]) -> Vec<Span> {
        let n = chars.len();
        let mut spans = Vec::new();
        if n == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            let hard_end = (start + self.chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                let min_end = start + (self.chunk_size / 2).max(self.chunk_overlap + 1);
                find_break(chars, min_end, hard_end)
            };

            spans.push(Span { start, end });
            if end == n {
                break;
            }
            start = self.next_start(chars, start, end);
        }

        spans
    }

    /// Start of the window after `[start, end)`.
    ///
    /// `end - chunk_overlap` is snapped left onto a word boundary, which only
    /// widens the overlap, and always stays strictly after `start`.
    fn next_start(&self, chars: &[char], start: usize, end: usize) -> usize {
        let target = end - self.chunk_overlap;
        let floor = (start + 1).max(target.saturating_sub(self.chunk_overlap));

        let mut s = target;
        while s > floor && !chars[s - 1].is_whitespace() {
            s -= 1;
        }

        if chars[s - 1].is_whitespace() {
            s
        } else {
            target
        }
    }

    /// Split page blocks into chunks, numbering them across all pages
    pub fn split_pages(&self, source: &str, pages: &[PageBlock]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        let mut index = 0u32;

        for page in pages {
            let chars: Vec<char> = page.text.chars().collect();

            for span in self.spans_of(&chars) {
                let raw: String = chars[span.start..span.end].iter().collect();
                let content = raw.trim();
                if content.is_empty() {
                    continue;
                }

                chunks.push(DocumentChunk::new(
                    content,
                    ChunkMetadata {
                        source: source.to_string(),
                        page: page.page,
                        chunk_index: index,
                        start_offset: span.start,
                        end_offset: span.end,
                    },
                ));
                index += 1;
            }
        }

        chunks
    }

    /// Split a loaded document
    pub fn split_document(&self, doc: &LoadedDocument) -> Vec<DocumentChunk> {
        self.split_pages(&doc.file_path, &doc.pages)
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Find a break point in `[min_end, hard_end]`, searching backwards.
///
/// Prefers ending right before a line break, then before any whitespace,
/// and falls back to a hard cut at `hard_end`. Requires `hard_end < chars.len()`.
fn find_break(chars: &[char], min_end: usize, hard_end: usize) -> usize {
    let candidates = || (min_end..=hard_end).rev();

    if let Some(e) = candidates().find(|&e| chars[e] == '\n') {
        return e;
    }
    if let Some(e) = candidates().find(|&e| chars[e].is_whitespace()) {
        return e;
    }
    hard_end
}

// ============================================================================
// Tests
// ============================================================================
