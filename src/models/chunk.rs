use serde::{Deserialize, Serialize};

/// A contiguous span of a document, produced by a chunker.
///
/// `start` and `end` are byte offsets into the source document, so
/// `&document[chunk.start..chunk.end] == chunk.text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            index,
            text: text.into(),
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
