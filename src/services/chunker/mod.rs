//! Document chunking.
//!
//! A [`Chunker`] turns a document into an ordered list of [`Chunk`]s that can
//! be embedded independently. Every strategy here is pure and deterministic,
//! and returns an empty list for empty or whitespace-only documents.

mod sentence;
mod window;

pub use sentence::SentenceChunker;
pub use window::WindowChunker;

use std::sync::Arc;

use crate::error::ChunkError;
use crate::models::{Chunk, ChunkStrategy, ChunkingConfig};

/// Splits documents into ordered chunks.
pub trait Chunker: Send + Sync {
    /// Split `document` into chunks, in document order.
    fn chunk(&self, document: &str) -> Vec<Chunk>;

    /// Chunk raw bytes, rejecting input that is not valid UTF-8.
    fn chunk_bytes(&self, document: &[u8]) -> Result<Vec<Chunk>, ChunkError> {
        let text = std::str::from_utf8(document).map_err(|e| {
            ChunkError::InvalidInput(format!(
                "document is not valid UTF-8 (byte {}): {e}",
                e.valid_up_to()
            ))
        })?;
        Ok(self.chunk(text))
    }

    /// Strategy name for logs and output.
    fn name(&self) -> &'static str;
}

/// Build the chunker selected by configuration.
pub fn build_chunker(config: &ChunkingConfig) -> Arc<dyn Chunker> {
    match config.strategy {
        ChunkStrategy::Sentence => Arc::new(SentenceChunker::new()),
        ChunkStrategy::Window => Arc::new(WindowChunker::new(
            config.chunk_size as usize,
            config.chunk_overlap as usize,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    const DOCUMENTS: &[&str] = &[
        "Hello world. How are you?",
        "No boundary here at all",
        "First paragraph line one\nline two.\n\nSecond paragraph!  Third? Yes.",
        "  leading and trailing whitespace.   ",
        "Ünïcödé sentences work. 日本語も大丈夫。 Right?",
        "Ellipsis... then more. \"Quoted.\" (Bracketed.) End",
    ];

    fn strategies() -> Vec<Arc<dyn Chunker>> {
        vec![
            Arc::new(SentenceChunker::new()),
            Arc::new(WindowChunker::new(16, 0)),
            Arc::new(WindowChunker::new(1000, 0)),
        ]
    }

    #[test]
    fn test_chunks_reconstruct_document() {
        for chunker in strategies() {
            for doc in DOCUMENTS {
                let chunks = chunker.chunk(doc);
                assert!(!chunks.is_empty(), "{} on {doc:?}", chunker.name());

                let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
                assert_eq!(strip_ws(&joined), strip_ws(doc), "{}", chunker.name());
            }
        }
    }

    #[test]
    fn test_chunk_indices_and_offsets() {
        for chunker in strategies() {
            for doc in DOCUMENTS {
                let chunks = chunker.chunk(doc);
                let mut previous_end = 0;
                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.index, i);
                    assert!(!chunk.text.is_empty());
                    assert_eq!(&doc[chunk.start..chunk.end], chunk.text);
                    assert!(chunk.start >= previous_end);
                    previous_end = chunk.end;
                }
            }
        }
    }

    #[test]
    fn test_empty_and_whitespace_documents() {
        for chunker in strategies() {
            assert!(chunker.chunk("").is_empty());
            assert!(chunker.chunk(" \n\t  ").is_empty());
        }
    }

    #[test]
    fn test_deterministic() {
        for chunker in strategies() {
            for doc in DOCUMENTS {
                assert_eq!(chunker.chunk(doc), chunker.chunk(doc));
            }
        }
    }

    #[test]
    fn test_chunk_bytes_rejects_invalid_utf8() {
        let chunker = SentenceChunker::new();
        let result = chunker.chunk_bytes(&[b'a', 0xff, b'b']);
        assert!(matches!(result, Err(ChunkError::InvalidInput(_))));

        let chunks = chunker.chunk_bytes("One. Two.".as_bytes()).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_build_from_config() {
        let config = ChunkingConfig::default();
        assert_eq!(build_chunker(&config).name(), "sentence");

        let config = ChunkingConfig {
            strategy: ChunkStrategy::Window,
            ..Default::default()
        };
        assert_eq!(build_chunker(&config).name(), "window");
    }
}
