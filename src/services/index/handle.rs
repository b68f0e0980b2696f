//! Handle to one named index.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{IndexBackend, IndexOptions};
use crate::error::IndexError;
use crate::models::{
    BatchReport, EmbeddingRecord, IndexDescriptor, Metadata, MetadataFilter, Metric, QueryMatch,
    RESERVED_ID_KEY, Vector, rank_matches,
};

/// Confirmation token for destructive whole-index operations. It must name
/// the index it is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAll {
    index: String,
}

impl DeleteAll {
    pub fn confirm(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub(crate) fn check(&self, target: &str) -> Result<(), IndexError> {
        if self.index != target {
            return Err(IndexError::InvalidInput(format!(
                "confirmation names index '{}' but the target is '{target}'",
                self.index
            )));
        }
        Ok(())
    }
}

/// A validated connection to one index.
///
/// Every call checks its input against the descriptor before reaching the
/// backend, runs under [`IndexOptions::timeout`] and retries transient
/// failures. Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct VectorIndex {
    backend: Arc<dyn IndexBackend>,
    descriptor: IndexDescriptor,
    options: IndexOptions,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("driver", &self.backend.driver())
            .field("descriptor", &self.descriptor)
            .field("options", &self.options)
            .finish()
    }
}

impl VectorIndex {
    pub(crate) fn new(
        backend: Arc<dyn IndexBackend>,
        descriptor: IndexDescriptor,
        options: IndexOptions,
    ) -> Self {
        Self {
            backend,
            descriptor,
            options,
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn dimension(&self) -> usize {
        self.descriptor.dimension
    }

    pub fn metric(&self) -> Metric {
        self.descriptor.metric
    }

    /// Same index with a different per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    fn check_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.descriptor.dimension {
            return Err(IndexError::DimensionMismatch {
                index: self.descriptor.name.clone(),
                expected: self.descriptor.dimension,
                actual: vector.len(),
            });
        }
        if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
            return Err(IndexError::InvalidInput(format!(
                "vector component {position} is not finite"
            )));
        }
        Ok(())
    }

    fn check_record(&self, record: &EmbeddingRecord) -> Result<(), IndexError> {
        if record.id.is_empty() {
            return Err(IndexError::InvalidInput(
                "record id must not be empty".to_string(),
            ));
        }
        if let Some(metadata) = &record.metadata
            && metadata.contains_key(RESERVED_ID_KEY)
        {
            return Err(IndexError::InvalidInput(format!(
                "metadata key '{RESERVED_ID_KEY}' is reserved"
            )));
        }
        self.check_vector(&record.vector)
    }

    /// Insert or replace one record.
    pub async fn upsert(
        &self,
        id: impl Into<String>,
        vector: Vector,
        metadata: Option<Metadata>,
    ) -> Result<(), IndexError> {
        let record = EmbeddingRecord {
            id: id.into(),
            vector,
            metadata,
        };
        self.upsert_record(record).await
    }

    pub async fn upsert_record(&self, record: EmbeddingRecord) -> Result<(), IndexError> {
        self.check_record(&record)?;
        let records = [record];
        self.options
            .run("upsert", true, || {
                self.backend.upsert(&self.descriptor, &records)
            })
            .await
    }

    /// Upsert many records in `batch_size` groups.
    ///
    /// Invalid records fail individually; a failed backend write fails every
    /// record in its group. Valid groups are still written.
    pub async fn upsert_batch(&self, records: Vec<EmbeddingRecord>) -> BatchReport {
        let mut report = BatchReport::new();
        let mut valid = Vec::with_capacity(records.len());

        for record in records {
            match self.check_record(&record) {
                Ok(()) => valid.push(record),
                Err(e) => report.record_failure(record.id, e),
            }
        }

        for group in valid.chunks(self.options.batch_size) {
            let result = self
                .options
                .run("upsert", true, || self.backend.upsert(&self.descriptor, group))
                .await;
            match result {
                Ok(()) => {
                    for record in group {
                        report.record_success(record.id.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        index = self.name(),
                        records = group.len(),
                        "upsert group failed: {e}"
                    );
                    report.record_group_failure(group.iter().map(|r| r.id.as_str()), &e);
                }
            }
        }

        tracing::debug!(
            index = self.name(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "upsert batch finished"
        );
        report
    }

    /// The `top_k` records most similar to `vector`, best first, ties broken
    /// by ascending id. An empty index yields an empty list.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        if top_k == 0 {
            return Err(IndexError::InvalidInput(
                "top_k must be greater than zero".to_string(),
            ));
        }
        self.check_vector(vector)?;

        let matches = self
            .options
            .run("query", self.options.retry_queries, || {
                self.backend.query(&self.descriptor, vector, top_k, filter)
            })
            .await?;

        Ok(rank_matches(matches, top_k))
    }

    pub async fn fetch(&self, id: &str) -> Result<EmbeddingRecord, IndexError> {
        self.options
            .run("fetch", true, || self.backend.fetch(&self.descriptor, id))
            .await?
            .ok_or_else(|| IndexError::NotFound {
                index: self.descriptor.name.clone(),
                id: id.to_string(),
            })
    }

    /// Remove one record. Deleting a missing id succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), IndexError> {
        let ids = [id.to_string()];
        self.options
            .run("delete", true, || self.backend.delete(&self.descriptor, &ids))
            .await
    }

    /// Remove many records in `batch_size` groups.
    pub async fn delete_many(&self, ids: &[String]) -> BatchReport {
        let mut report = BatchReport::new();

        for group in ids.chunks(self.options.batch_size) {
            let result = self
                .options
                .run("delete", true, || self.backend.delete(&self.descriptor, group))
                .await;
            match result {
                Ok(()) => {
                    for id in group {
                        report.record_success(id.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(index = self.name(), ids = group.len(), "delete group failed: {e}");
                    report.record_group_failure(group.iter().map(String::as_str), &e);
                }
            }
        }

        report
    }

    /// Remove every record, keeping the index itself.
    pub async fn delete_all(&self, confirmation: DeleteAll) -> Result<(), IndexError> {
        confirmation.check(self.name())?;
        self.options
            .run("delete_all", true, || self.backend.delete_all(&self.descriptor))
            .await?;
        tracing::info!(index = self.name(), "deleted all records");
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, IndexError> {
        self.options
            .run("count", true, || self.backend.count(&self.descriptor))
            .await
    }
}
