//! Search-related models for pipeline results and output.

use serde::{Deserialize, Serialize};

use super::record::Metadata;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A single pipeline search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Record id in the index
    pub id: String,

    /// Final score: the rerank score when re-ranking ran, otherwise the
    /// index similarity
    pub score: f32,

    /// First-stage similarity from the index
    pub index_score: f32,

    /// Chunk text, when it was stored alongside the vector
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Metadata>,
}

/// Collection of search hits for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub reranked: bool,
    pub duration_ms: u64,
}

impl SearchResults {
    pub fn new(query: String, hits: Vec<SearchHit>, reranked: bool, duration_ms: u64) -> Self {
        Self {
            query,
            hits,
            reranked,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}
