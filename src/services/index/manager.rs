//! Index lifecycle: create, connect, list and drop named indexes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::{CreateOutcome, DeleteAll, IndexBackend, VectorIndex, create_backend};
use crate::error::IndexError;
use crate::models::{IndexConfig, IndexDescriptor, Metric, Placement};
use crate::utils::retry::{RetryConfig, with_retry};

/// Per-call limits applied to every index operation.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Records per backend write in batch operations.
    pub batch_size: usize,
    /// Queries are idempotent but latency-sensitive callers may prefer a
    /// fast failure.
    pub retry_queries: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            batch_size: 100,
            retry_queries: true,
        }
    }
}

impl IndexOptions {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            retry: RetryConfig::new(config.max_retries.saturating_add(1)),
            batch_size: config.batch_size.max(1) as usize,
            retry_queries: config.retry_queries,
        }
    }

    /// Run one backend call under the timeout, retrying transient failures
    /// when `retry` is set.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        retry: bool,
        mut call: F,
    ) -> Result<T, IndexError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexError>>,
    {
        let timeout = self.timeout;
        let schedule = if retry {
            self.retry.clone()
        } else {
            RetryConfig::none()
        };

        with_retry(&schedule, operation, || {
            let attempt = call();
            async move {
                tokio::time::timeout(timeout, attempt)
                    .await
                    .unwrap_or_else(|_| {
                        Err(IndexError::Timeout {
                            operation: operation.to_string(),
                            timeout,
                        })
                    })
            }
        })
        .await
        .into_result()
    }
}

/// Creates and connects to named indexes on one backend.
///
/// The manager is an explicit value passed to whoever needs it; there is no
/// process-wide client. Index creation within one manager is serialized, and
/// a creation lost to another process is detected and re-validated.
pub struct VectorIndexManager {
    backend: Arc<dyn IndexBackend>,
    options: IndexOptions,
    create_lock: Mutex<()>,
}

impl VectorIndexManager {
    pub fn new(backend: Arc<dyn IndexBackend>, options: IndexOptions) -> Self {
        Self {
            backend,
            options,
            create_lock: Mutex::new(()),
        }
    }

    /// Build the backend selected by `config` and wrap it.
    pub async fn from_config(config: &IndexConfig) -> Result<Self, IndexError> {
        let backend = create_backend(config).await?;
        Ok(Self::new(backend, IndexOptions::from_config(config)))
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn backend(&self) -> &Arc<dyn IndexBackend> {
        &self.backend
    }

    /// Return a handle to `name`, creating the index if it does not exist.
    ///
    /// An existing index with a different dimension or metric fails with
    /// [`IndexError::ConfigConflict`]. Placement hints never conflict.
    pub async fn ensure_index(
        &self,
        name: &str,
        dimension: usize,
        metric: Metric,
        placement: Placement,
    ) -> Result<VectorIndex, IndexError> {
        let requested = IndexDescriptor::new(name, dimension, metric, placement)?;
        let _guard = self.create_lock.lock().await;

        if let Some(existing) = self.describe(name).await? {
            requested.check_compatible(&existing)?;
            tracing::debug!(index = name, "connected to existing index");
            return Ok(self.handle(existing));
        }

        // Not retried: a create that timed out may have succeeded, so the
        // next ensure_index re-reads instead
        let outcome = self
            .options
            .run("create_index", false, || self.backend.create_index(&requested))
            .await?;

        match outcome {
            CreateOutcome::Created => {
                tracing::info!(
                    index = name,
                    dimension,
                    metric = %metric,
                    driver = %self.backend.driver(),
                    "created index"
                );
                Ok(self.handle(requested))
            }
            CreateOutcome::AlreadyExists => {
                tracing::debug!(index = name, "index created concurrently, validating");
                let existing = self
                    .describe(name)
                    .await?
                    .ok_or_else(|| IndexError::IndexNotFound(name.to_string()))?;
                requested.check_compatible(&existing)?;
                Ok(self.handle(existing))
            }
        }
    }

    /// Connect to an existing index.
    pub async fn connect(&self, name: &str) -> Result<VectorIndex, IndexError> {
        let descriptor = self
            .describe(name)
            .await?
            .ok_or_else(|| IndexError::IndexNotFound(name.to_string()))?;
        Ok(self.handle(descriptor))
    }

    pub async fn describe(&self, name: &str) -> Result<Option<IndexDescriptor>, IndexError> {
        self.options
            .run("describe_index", true, || self.backend.describe_index(name))
            .await
    }

    pub async fn list_index_names(&self) -> Result<Vec<String>, IndexError> {
        self.options
            .run("list_indexes", true, || self.backend.list_index_names())
            .await
    }

    /// Drop an index and all of its records. The confirmation must name the
    /// index. Returns whether an index was removed.
    pub async fn drop_index(&self, name: &str, confirmation: &DeleteAll) -> Result<bool, IndexError> {
        confirmation.check(name)?;
        let _guard = self.create_lock.lock().await;

        let dropped = self
            .options
            .run("drop_index", true, || self.backend.drop_index(name))
            .await?;
        if dropped {
            tracing::info!(index = name, "dropped index");
        }
        Ok(dropped)
    }

    fn handle(&self, descriptor: IndexDescriptor) -> VectorIndex {
        VectorIndex::new(Arc::clone(&self.backend), descriptor, self.options.clone())
    }
}
