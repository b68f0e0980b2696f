//! Fixed-size window chunking with overlap.

use super::Chunker;
use crate::models::Chunk;

/// Splits text into windows of roughly `chunk_size` characters that snap to
/// a natural break near the window end.
///
/// Consecutive windows share `overlap` characters. With `overlap == 0` the
/// windows tile the document exactly.
#[derive(Debug, Clone)]
pub struct WindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl WindowChunker {
    /// `chunk_size` is clamped to at least 1 and `overlap` to below it.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    /// Character spans `(start, end)` of each window.
    fn windows(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let total = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < total {
            let target_end = (start + self.chunk_size).min(total);
            let end = self.find_break_point(chars, start, target_end);
            spans.push((start, end));

            if end >= total {
                break;
            }
            // Always advance, even when the break point sits inside the overlap
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        spans
    }

    /// Find a natural break in the last 20% of the window.
    ///
    /// Priority: paragraph break > newline > sentence end > space.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        if target_end >= chars.len() {
            return chars.len();
        }

        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + 1);
        if search_start >= target_end {
            return target_end;
        }

        let mut paragraph = None;
        let mut newline = None;
        let mut sentence = None;
        let mut space = None;

        for pos in search_start..target_end {
            match chars[pos] {
                '\n' => {
                    if pos > 0 && chars[pos - 1] == '\n' {
                        paragraph = Some(pos + 1);
                    }
                    newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => space = Some(pos + 1),
                _ => {}
            }
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(target_end)
    }
}

impl Chunker for WindowChunker {
    fn chunk(&self, document: &str) -> Vec<Chunk> {
        if document.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.chars().collect();
        // Byte offset of every char index, plus the end of the document
        let mut byte_at: Vec<usize> = document.char_indices().map(|(i, _)| i).collect();
        byte_at.push(document.len());

        self.windows(&chars)
            .into_iter()
            .map(|(start, end)| (byte_at[start], byte_at[end]))
            .filter(|&(start, end)| !document[start..end].trim().is_empty())
            .enumerate()
            .map(|(index, (start, end))| Chunk::new(index, &document[start..end], start, end))
            .collect()
    }

    fn name(&self) -> &'static str {
        "window"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_document_single_chunk() {
        let chunks = WindowChunker::new(100, 10).chunk("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_windows_overlap() {
        let content = "a".repeat(500);
        let chunks = WindowChunker::new(200, 40).chunk(&content);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 40);
        }
        assert_eq!(chunks.last().unwrap().end, 500);
    }

    #[test]
    fn test_zero_overlap_tiles_document() {
        let doc = "word ".repeat(60);
        let chunks = WindowChunker::new(32, 0).chunk(&doc);

        let mut expected_start = 0;
        for chunk in &chunks {
            assert_eq!(chunk.start, expected_start);
            expected_start = chunk.end;
        }
        assert_eq!(expected_start, doc.len());
    }

    #[test]
    fn test_prefers_sentence_break() {
        let doc = "This is sentence one. This is sentence two which runs long";
        let chunks = WindowChunker::new(25, 0).chunk(doc);
        assert_eq!(chunks[0].text, "This is sentence one.");
    }

    #[test]
    fn test_multibyte_offsets() {
        let doc = "日本語のテキスト。".repeat(10);
        let chunks = WindowChunker::new(7, 2).chunk(&doc);
        for chunk in &chunks {
            assert_eq!(&doc[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let chunks = WindowChunker::new(4, 10).chunk("abcdefghij");
        assert!(chunks.len() >= 3);
        assert_eq!(chunks.last().unwrap().end, 10);
    }
}
