//! In-process index backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{CreateOutcome, IndexBackend};
use crate::error::IndexError;
use crate::models::{
    EmbeddingRecord, IndexDescriptor, Metadata, MetadataFilter, QueryMatch, Vector, VectorDriver,
    rank_matches,
};

#[derive(Debug)]
struct MemoryIndex {
    descriptor: IndexDescriptor,
    records: BTreeMap<String, (Vector, Option<Metadata>)>,
}

/// Exact brute-force index held in memory. Queries score every record, so
/// results match the metric definitions bit for bit.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    indexes: RwLock<HashMap<String, Arc<RwLock<MemoryIndex>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, name: &str) -> Result<Arc<RwLock<MemoryIndex>>, IndexError> {
        self.indexes
            .read()
            .map_err(|_| poisoned(name))?
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::IndexNotFound(name.to_string()))
    }
}

fn poisoned(operation: &str) -> IndexError {
    IndexError::Backend {
        operation: operation.to_string(),
        message: "memory index lock poisoned".to_string(),
    }
}

#[async_trait]
impl IndexBackend for MemoryBackend {
    fn driver(&self) -> VectorDriver {
        VectorDriver::Memory
    }

    async fn list_index_names(&self) -> Result<Vec<String>, IndexError> {
        let indexes = self.indexes.read().map_err(|_| poisoned("list_indexes"))?;
        let mut names: Vec<String> = indexes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescriptor>, IndexError> {
        let indexes = self.indexes.read().map_err(|_| poisoned("describe_index"))?;
        match indexes.get(name) {
            Some(index) => {
                let index = index.read().map_err(|_| poisoned("describe_index"))?;
                Ok(Some(index.descriptor.clone()))
            }
            None => Ok(None),
        }
    }

    async fn create_index(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<CreateOutcome, IndexError> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned("create_index"))?;
        if indexes.contains_key(&descriptor.name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        indexes.insert(
            descriptor.name.clone(),
            Arc::new(RwLock::new(MemoryIndex {
                descriptor: descriptor.clone(),
                records: BTreeMap::new(),
            })),
        );
        Ok(CreateOutcome::Created)
    }

    async fn drop_index(&self, name: &str) -> Result<bool, IndexError> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned("drop_index"))?;
        Ok(indexes.remove(name).is_some())
    }

    async fn upsert(
        &self,
        index: &IndexDescriptor,
        records: &[EmbeddingRecord],
    ) -> Result<(), IndexError> {
        let index = self.index(&index.name)?;
        let mut index = index.write().map_err(|_| poisoned("upsert"))?;
        for record in records {
            index.records.insert(
                record.id.clone(),
                (record.vector.clone(), record.metadata.clone()),
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &IndexDescriptor,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let metric = index.metric;
        let index = self.index(&index.name)?;
        let index = index.read().map_err(|_| poisoned("query"))?;

        let matches = index
            .records
            .iter()
            .filter(|(_, (_, metadata))| filter.is_none_or(|f| f.matches(metadata.as_ref())))
            .map(|(id, (stored, metadata))| QueryMatch {
                id: id.clone(),
                score: metric.score(vector, stored),
                metadata: metadata.clone(),
            })
            .collect();

        Ok(rank_matches(matches, top_k))
    }

    async fn fetch(
        &self,
        index: &IndexDescriptor,
        id: &str,
    ) -> Result<Option<EmbeddingRecord>, IndexError> {
        let index = self.index(&index.name)?;
        let index = index.read().map_err(|_| poisoned("fetch"))?;
        Ok(index.records.get(id).map(|(vector, metadata)| EmbeddingRecord {
            id: id.to_string(),
            vector: vector.clone(),
            metadata: metadata.clone(),
        }))
    }

    async fn delete(&self, index: &IndexDescriptor, ids: &[String]) -> Result<(), IndexError> {
        let index = self.index(&index.name)?;
        let mut index = index.write().map_err(|_| poisoned("delete"))?;
        for id in ids {
            index.records.remove(id);
        }
        Ok(())
    }

    async fn delete_all(&self, index: &IndexDescriptor) -> Result<(), IndexError> {
        let index = self.index(&index.name)?;
        index
            .write()
            .map_err(|_| poisoned("delete_all"))?
            .records
            .clear();
        Ok(())
    }

    async fn count(&self, index: &IndexDescriptor) -> Result<u64, IndexError> {
        let index = self.index(&index.name)?;
        let index = index.read().map_err(|_| poisoned("count"))?;
        Ok(index.records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, Placement};

    fn descriptor(name: &str, metric: Metric) -> IndexDescriptor {
        IndexDescriptor::new(name, 2, metric, Placement::default()).unwrap()
    }

    #[tokio::test]
    async fn test_create_reports_existing() {
        let backend = MemoryBackend::new();
        let docs = descriptor("docs", Metric::Cosine);
        assert_eq!(
            backend.create_index(&docs).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            backend.create_index(&docs).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(backend.list_index_names().await.unwrap(), ["docs"]);
    }

    #[tokio::test]
    async fn test_euclidean_query_prefers_nearest() {
        let backend = MemoryBackend::new();
        let index = descriptor("points", Metric::Euclidean);
        backend.create_index(&index).await.unwrap();
        backend
            .upsert(
                &index,
                &[
                    EmbeddingRecord::new("near", vec![1.0, 1.0]),
                    EmbeddingRecord::new("far", vec![10.0, 10.0]),
                    EmbeddingRecord::new("exact", vec![0.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let matches = backend.query(&index, &[0.0, 0.0], 3, None).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["exact", "near", "far"]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_applies_filter() {
        let backend = MemoryBackend::new();
        let index = descriptor("docs", Metric::DotProduct);
        backend.create_index(&index).await.unwrap();

        let mut en = Metadata::new();
        en.insert("lang".to_string(), "en".into());
        let mut de = Metadata::new();
        de.insert("lang".to_string(), "de".into());

        backend
            .upsert(
                &index,
                &[
                    EmbeddingRecord::new("a", vec![1.0, 0.0]).with_metadata(en),
                    EmbeddingRecord::new("b", vec![2.0, 0.0]).with_metadata(de),
                    EmbeddingRecord::new("c", vec![3.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let filter = MetadataFilter::new().eq("lang", "en");
        let matches = backend
            .query(&index, &[1.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn test_operations_on_missing_index() {
        let backend = MemoryBackend::new();
        let ghost = descriptor("ghost", Metric::Cosine);
        assert!(matches!(
            backend.count(&ghost).await,
            Err(IndexError::IndexNotFound(_))
        ));
        assert!(!backend.drop_index("ghost").await.unwrap());
    }
}
