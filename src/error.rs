//! Error types for the retrieval core.

use std::time::Duration;

use thiserror::Error;

use crate::models::EncoderMode;
use crate::utils::retry::Retryable;

/// Errors related to document chunking.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid document: {0}")]
    InvalidInput(String),
}

/// Errors related to encoding text into vectors or pair scores.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("invalid input at index {index}: {reason}")]
    InvalidInput { index: usize, reason: String },

    #[error("paired batch length mismatch: {queries} queries, {candidates} candidates")]
    LengthMismatch { queries: usize, candidates: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("encoder is in {actual} mode, operation requires {expected} mode")]
    WrongMode {
        expected: EncoderMode,
        actual: EncoderMode,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("model not found: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors related to vector index operations.
///
/// Every variant carries enough context (index, operation, id) to identify
/// what failed without inspecting the call site.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dimension mismatch on index '{index}': expected {expected}, got {actual}")]
    DimensionMismatch {
        index: String,
        expected: usize,
        actual: usize,
    },

    #[error("index configuration conflict: {0}")]
    ConfigConflict(String),

    #[error("record '{id}' not found in index '{index}'")]
    NotFound { index: String, id: String },

    #[error("index '{0}' does not exist")]
    IndexNotFound(String),

    #[error("{operation}: service unavailable: {message}")]
    ServiceUnavailable { operation: String, message: String },

    #[error("{operation}: timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("{operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("batch partially failed: {} succeeded, {} failed", succeeded.len(), failed.len())]
    PartialFailure {
        succeeded: Vec<String>,
        failed: Vec<(String, String)>,
    },
}

impl IndexError {
    /// Classify a raw backend error message, mapping connectivity problems to
    /// [`IndexError::ServiceUnavailable`].
    pub fn from_backend(operation: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let transient = lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("unavailable")
            || lower.contains("too many")
            || lower.contains("transport");

        if transient {
            IndexError::ServiceUnavailable {
                operation: operation.to_string(),
                message,
            }
        } else {
            IndexError::Backend {
                operation: operation.to_string(),
                message,
            }
        }
    }
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::ServiceUnavailable { .. } | IndexError::Timeout { .. }
        )
    }
}

/// Errors raised while running the chunk → encode → index pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_classification() {
        let err = IndexError::from_backend("upsert", "connection refused");
        assert!(matches!(err, IndexError::ServiceUnavailable { .. }));
        assert!(err.is_retryable());

        let err = IndexError::from_backend("upsert", "wrong input: bad payload");
        assert!(matches!(err, IndexError::Backend { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_input_errors_are_not_retryable() {
        assert!(!IndexError::InvalidInput("top_k".to_string()).is_retryable());
        assert!(
            !IndexError::DimensionMismatch {
                index: "docs".to_string(),
                expected: 4,
                actual: 3,
            }
            .is_retryable()
        );
        assert!(
            IndexError::Timeout {
                operation: "query".to_string(),
                timeout: Duration::from_secs(1),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_messages_identify_context() {
        let err = IndexError::NotFound {
            index: "docs".to_string(),
            id: "c7".to_string(),
        };
        assert_eq!(err.to_string(), "record 'c7' not found in index 'docs'");

        let err = EncoderError::InvalidInput {
            index: 2,
            reason: "empty text".to_string(),
        };
        assert_eq!(err.to_string(), "invalid input at index 2: empty text");
    }

    #[test]
    fn test_app_error_wraps_domains() {
        fn open() -> Result<(), AppError> {
            Err(PipelineError::InvalidQuery("blank".to_string()))?
        }
        let err = open().unwrap_err();
        assert!(matches!(err, AppError::Pipeline(PipelineError::InvalidQuery(_))));
        assert_eq!(err.to_string(), "pipeline error: invalid query: blank");

        let err: AppError = ConfigError::ValidationError("dimension".to_string()).into();
        assert!(err.to_string().starts_with("config error"));
    }
}
