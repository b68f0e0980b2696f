//! Sentence-boundary chunking.

use regex::Regex;

use super::Chunker;
use crate::models::Chunk;

/// Sentence terminators (optionally followed by closing quotes or brackets)
/// that are followed by whitespace, or a blank line.
const BOUNDARY_PATTERN: &str = r#"[.!?]+["'”’)\]]*\s+|\n[ \t]*\n\s*"#;

/// Splits a document into one chunk per sentence or paragraph fragment.
///
/// Each chunk is trimmed; the whitespace between chunks is the only text
/// that does not appear in the output. Text without any boundary comes back
/// as a single chunk, so re-chunking a chunk yields it unchanged.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    boundary: Regex,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(BOUNDARY_PATTERN).expect("valid sentence boundary pattern"),
        }
    }

    /// Byte spans `(start, end)` of the untrimmed segments.
    fn segments(&self, document: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start = 0;

        for m in self.boundary.find_iter(document) {
            // Keep the terminator and closing quotes, drop the whitespace
            let end = m.start() + m.as_str().trim_end().len();
            spans.push((start, end));
            start = m.end();
        }
        spans.push((start, document.len()));
        spans
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for (start, end) in self.segments(document) {
            let raw = &document[start..end];
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }

            let leading = raw.len() - raw.trim_start().len();
            let chunk_start = start + leading;
            chunks.push(Chunk::new(
                chunks.len(),
                text,
                chunk_start,
                chunk_start + text.len(),
            ));
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_two_sentences() {
        let chunks = SentenceChunker::new().chunk("Hello world. How are you?");
        assert_eq!(texts(&chunks), ["Hello world.", "How are you?"]);
        assert_eq!(chunks[1].start, 13);
        assert_eq!(chunks[1].end, 25);
    }

    #[test]
    fn test_no_boundary_returns_whole_document() {
        let chunks = SentenceChunker::new().chunk("  just a fragment without an end  ");
        assert_eq!(texts(&chunks), ["just a fragment without an end"]);
    }

    #[test]
    fn test_paragraph_breaks_split() {
        let chunks = SentenceChunker::new().chunk("Heading\n\nBody text here");
        assert_eq!(texts(&chunks), ["Heading", "Body text here"]);
    }

    #[test]
    fn test_closing_quotes_stay_with_sentence() {
        let chunks = SentenceChunker::new().chunk(r#"She said "stop." Then left! Why?"#);
        assert_eq!(texts(&chunks), [r#"She said "stop.""#, "Then left!", "Why?"]);
    }

    #[test]
    fn test_decimal_numbers_are_not_boundaries() {
        let chunks = SentenceChunker::new().chunk("Pi is 3.14 roughly. Ok.");
        assert_eq!(texts(&chunks), ["Pi is 3.14 roughly.", "Ok."]);
    }

    #[test]
    fn test_idempotent_on_chunks() {
        let chunker = SentenceChunker::new();
        let doc = "One. Two!\n\nThree? \"Four.\" Five";
        for chunk in chunker.chunk(doc) {
            let again = chunker.chunk(&chunk.text);
            assert_eq!(texts(&again), [chunk.text.as_str()]);
        }
    }
}
