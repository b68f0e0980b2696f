//! Vector index layer.
//!
//! [`IndexBackend`] is the seam to a vector-search service. Backends are
//! selected by [`VectorDriver`] through [`create_backend`]:
//! an in-process [`MemoryBackend`], Qdrant, or PostgreSQL with pgvector.
//!
//! Callers never talk to a backend directly. A [`VectorIndexManager`] owns
//! the backend and hands out [`VectorIndex`] handles that validate input,
//! bound every call with a timeout and retry transient failures.

mod handle;
mod manager;
mod memory;
mod pgvector;
mod qdrant;

pub use handle::{DeleteAll, VectorIndex};
pub use manager::{IndexOptions, VectorIndexManager};
pub use memory::MemoryBackend;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{
    EmbeddingRecord, IndexConfig, IndexDescriptor, MetadataFilter, QueryMatch, VectorDriver,
};

/// Result of asking a backend to create an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Another caller created it first.
    AlreadyExists,
}

/// Operations a vector-search service must provide.
///
/// Record-level methods receive the descriptor of an index the manager has
/// already validated; backends do not re-check dimensions. Scores returned by
/// `query` are "higher is closer" for every metric.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    fn driver(&self) -> VectorDriver;

    async fn list_index_names(&self) -> Result<Vec<String>, IndexError>;

    /// `None` when the index does not exist.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescriptor>, IndexError>;

    /// Create an index. Must report [`CreateOutcome::AlreadyExists`] instead
    /// of failing when the name is taken.
    async fn create_index(&self, descriptor: &IndexDescriptor)
    -> Result<CreateOutcome, IndexError>;

    /// Returns whether an index was removed.
    async fn drop_index(&self, name: &str) -> Result<bool, IndexError>;

    /// Insert or replace records. Each record is written whole or not at all.
    async fn upsert(
        &self,
        index: &IndexDescriptor,
        records: &[EmbeddingRecord],
    ) -> Result<(), IndexError>;

    async fn query(
        &self,
        index: &IndexDescriptor,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>, IndexError>;

    async fn fetch(
        &self,
        index: &IndexDescriptor,
        id: &str,
    ) -> Result<Option<EmbeddingRecord>, IndexError>;

    /// Remove records; unknown ids are ignored.
    async fn delete(&self, index: &IndexDescriptor, ids: &[String]) -> Result<(), IndexError>;

    async fn delete_all(&self, index: &IndexDescriptor) -> Result<(), IndexError>;

    async fn count(&self, index: &IndexDescriptor) -> Result<u64, IndexError>;
}

/// Create the backend selected by `config.driver`.
pub async fn create_backend(config: &IndexConfig) -> Result<Arc<dyn IndexBackend>, IndexError> {
    match config.driver {
        VectorDriver::Memory => Ok(Arc::new(MemoryBackend::new())),
        VectorDriver::Qdrant => Ok(Arc::new(QdrantBackend::new(config)?)),
        VectorDriver::PostgreSQL => Ok(Arc::new(PgVectorBackend::new(config).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_uses_memory_backend() {
        let backend = create_backend(&IndexConfig::default()).await.unwrap();
        assert_eq!(backend.driver(), VectorDriver::Memory);
        assert!(backend.list_index_names().await.unwrap().is_empty());
    }
}
