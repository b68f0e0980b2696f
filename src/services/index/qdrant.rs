//! Qdrant index backend.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePoints, DeletePointsBuilder,
    Distance, Filter, GetPointsBuilder, PointId, PointStruct, PointsIdsList, Range,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use uuid::Uuid;

use super::{CreateOutcome, IndexBackend};
use crate::error::IndexError;
use crate::models::{
    EmbeddingRecord, IndexConfig, IndexDescriptor, Metadata, MetadataFilter, MetadataValue,
    Metric, Placement, QueryMatch, RESERVED_ID_KEY, VectorDriver,
};
use crate::utils::similarity::distance_to_score;

/// Payload field holding the caller's record id. Qdrant point ids must be
/// integers or UUIDs, so string ids are mapped to UUIDv5.
const ID_FIELD: &str = RESERVED_ID_KEY;

/// Qdrant backend. Each index is a collection with one unnamed dense vector.
///
/// Qdrant normalizes vectors stored in cosine collections, so `fetch` on a
/// cosine index returns the unit-length form of what was upserted.
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexError::from_backend("connect", format!("connection: {e}")))?;

        Ok(Self { client })
    }
}

fn point_id(id: &str) -> PointId {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes())
        .to_string()
        .into()
}

fn distance(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::DotProduct => Distance::Dot,
        Metric::Euclidean => Distance::Euclid,
    }
}

fn metric(distance: Distance) -> Option<Metric> {
    match distance {
        Distance::Cosine => Some(Metric::Cosine),
        Distance::Dot => Some(Metric::DotProduct),
        Distance::Euclid => Some(Metric::Euclidean),
        _ => None,
    }
}

/// Delete request matching every point of `collection`. The collection and
/// its vector config are left in place.
fn clear_points(collection: &str) -> DeletePoints {
    DeletePointsBuilder::new(collection)
        .points(Filter::default())
        .wait(true)
        .build()
}

fn to_payload(record: &EmbeddingRecord) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    if let Some(metadata) = &record.metadata {
        for (key, value) in metadata {
            let value: Value = match value {
                MetadataValue::Bool(b) => (*b).into(),
                MetadataValue::Integer(n) => (*n).into(),
                MetadataValue::Float(x) => (*x).into(),
                MetadataValue::String(s) => s.clone().into(),
            };
            payload.insert(key.clone(), value);
        }
    }
    payload.insert(ID_FIELD.to_string(), record.id.clone().into());
    payload
}

/// Split a point payload into the record id and its metadata.
fn from_payload(mut payload: HashMap<String, Value>) -> (Option<String>, Option<Metadata>) {
    let id = payload.remove(ID_FIELD).and_then(|v| match v.kind {
        Some(Kind::StringValue(s)) => Some(s),
        _ => None,
    });

    let metadata: Metadata = payload
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value.kind? {
                Kind::BoolValue(b) => MetadataValue::Bool(b),
                Kind::IntegerValue(n) => MetadataValue::Integer(n),
                Kind::DoubleValue(x) => MetadataValue::Float(x),
                Kind::StringValue(s) => MetadataValue::String(s),
                _ => return None,
            };
            Some((key, value))
        })
        .collect();

    (id, (!metadata.is_empty()).then_some(metadata))
}

fn build_filter(filter: &MetadataFilter) -> Option<Filter> {
    if filter.is_empty() {
        return None;
    }

    let conditions: Vec<Condition> = filter
        .must
        .iter()
        .map(|(key, value)| match value {
            MetadataValue::Bool(b) => Condition::matches(key.clone(), *b),
            MetadataValue::Integer(n) => Condition::matches(key.clone(), *n),
            MetadataValue::String(s) => Condition::matches(key.clone(), s.clone()),
            // Float payloads only support range conditions
            MetadataValue::Float(x) => Condition::range(
                key.clone(),
                Range {
                    gte: Some(*x),
                    lte: Some(*x),
                    ..Default::default()
                },
            ),
        })
        .collect();

    Some(Filter::must(conditions))
}

#[async_trait]
impl IndexBackend for QdrantBackend {
    fn driver(&self) -> VectorDriver {
        VectorDriver::Qdrant
    }

    async fn list_index_names(&self) -> Result<Vec<String>, IndexError> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| IndexError::from_backend("list_indexes", e.to_string()))?;

        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescriptor>, IndexError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| IndexError::from_backend("describe_index", e.to_string()))?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| IndexError::from_backend("describe_index", e.to_string()))?;

        let unsupported = |reason: &str| IndexError::Backend {
            operation: "describe_index".to_string(),
            message: format!("collection '{name}' {reason}"),
        };

        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .ok_or_else(|| unsupported("has no parameters"))?;

        let vector_params = match params.vectors_config.and_then(|v| v.config) {
            Some(VectorsConfigKind::Params(p)) => p,
            _ => return Err(unsupported("does not use a single unnamed vector")),
        };

        let metric = Distance::try_from(vector_params.distance)
            .ok()
            .and_then(metric)
            .ok_or_else(|| unsupported("uses an unsupported distance"))?;

        let placement = Placement {
            shards: params.shard_number.max(1),
            replicas: params.replication_factor.unwrap_or(1).max(1),
            region: None,
        };

        IndexDescriptor::new(name, vector_params.size as usize, metric, placement).map(Some)
    }

    async fn create_index(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<CreateOutcome, IndexError> {
        let create = CreateCollectionBuilder::new(&descriptor.name)
            .vectors_config(VectorParamsBuilder::new(
                descriptor.dimension as u64,
                distance(descriptor.metric),
            ))
            .shard_number(descriptor.placement.shards)
            .replication_factor(descriptor.placement.replicas);

        match self.client.create_collection(create).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e) if e.to_string().contains("already exists") => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(IndexError::from_backend("create_index", e.to_string())),
        }
    }

    async fn drop_index(&self, name: &str) -> Result<bool, IndexError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| IndexError::from_backend("drop_index", e.to_string()))?;
        if !exists {
            return Ok(false);
        }

        self.client
            .delete_collection(name)
            .await
            .map_err(|e| IndexError::from_backend("drop_index", e.to_string()))?;
        Ok(true)
    }

    async fn upsert(
        &self,
        index: &IndexDescriptor,
        records: &[EmbeddingRecord],
    ) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .iter()
            .map(|record| PointStruct::new(point_id(&record.id), record.vector.clone(), to_payload(record)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&index.name, points).wait(true))
            .await
            .map_err(|e| IndexError::from_backend("upsert", e.to_string()))?;
        Ok(())
    }

    async fn query(
        &self,
        index: &IndexDescriptor,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let mut search = SearchPointsBuilder::new(&index.name, vector.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(f) = filter.and_then(build_filter) {
            search = search.filter(f);
        }

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| IndexError::from_backend("query", e.to_string()))?;

        let matches = response
            .result
            .into_iter()
            .filter_map(|point| {
                let (id, metadata) = from_payload(point.payload);
                // Euclid collections report raw distances
                let score = match index.metric {
                    Metric::Euclidean => distance_to_score(point.score),
                    Metric::Cosine | Metric::DotProduct => point.score,
                };
                Some(QueryMatch {
                    id: id?,
                    score,
                    metadata,
                })
            })
            .collect();

        Ok(matches)
    }

    async fn fetch(
        &self,
        index: &IndexDescriptor,
        id: &str,
    ) -> Result<Option<EmbeddingRecord>, IndexError> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&index.name, vec![point_id(id)])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| IndexError::from_backend("fetch", e.to_string()))?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };

        #[allow(deprecated)]
        let vector = match point.vectors.and_then(|v| v.vectors_options) {
            Some(VectorsOptions::Vector(v)) => v.data,
            _ => {
                return Err(IndexError::Backend {
                    operation: "fetch".to_string(),
                    message: format!("point '{id}' has no dense vector"),
                });
            }
        };

        let (_, metadata) = from_payload(point.payload);
        Ok(Some(EmbeddingRecord {
            id: id.to_string(),
            vector,
            metadata,
        }))
    }

    async fn delete(&self, index: &IndexDescriptor, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }

        let selector = PointsIdsList {
            ids: ids.iter().map(|id| point_id(id)).collect(),
        };
        self.client
            .delete_points(
                DeletePointsBuilder::new(&index.name)
                    .points(selector)
                    .wait(true),
            )
            .await
            .map_err(|e| IndexError::from_backend("delete", e.to_string()))?;
        Ok(())
    }

    async fn delete_all(&self, index: &IndexDescriptor) -> Result<(), IndexError> {
        self.client
            .delete_points(clear_points(&index.name))
            .await
            .map_err(|e| IndexError::from_backend("delete_all", e.to_string()))?;
        Ok(())
    }

    async fn count(&self, index: &IndexDescriptor) -> Result<u64, IndexError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&index.name).exact(true))
            .await
            .map_err(|e| IndexError::from_backend("count", e.to_string()))?;
        Ok(response.result.map_or(0, |r| r.count))
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::points_selector::PointsSelectorOneOf;

    use super::*;

    #[test]
    fn test_clear_points_keeps_collection() {
        let request = clear_points("docs");
        assert_eq!(request.collection_name, "docs");
        assert_eq!(request.wait, Some(true));
        match request.points.and_then(|p| p.points_selector_one_of) {
            Some(PointsSelectorOneOf::Filter(filter)) => {
                assert!(filter.must.is_empty());
                assert!(filter.should.is_empty());
                assert!(filter.must_not.is_empty());
            }
            other => panic!("expected match-all filter, got {other:?}"),
        }
    }

    #[test]
    fn test_point_ids_are_stable_uuids() {
        let a = point_id("doc:0");
        assert_eq!(a, point_id("doc:0"));
        assert_ne!(a, point_id("doc:1"));
    }

    #[test]
    fn test_metric_distance_mapping() {
        for m in [Metric::Cosine, Metric::DotProduct, Metric::Euclidean] {
            assert_eq!(metric(distance(m)), Some(m));
        }
    }

    #[test]
    fn test_payload_keeps_id_and_metadata() {
        let mut meta = Metadata::new();
        meta.insert("lang".to_string(), "en".into());
        meta.insert("page".to_string(), 4i64.into());
        let record = EmbeddingRecord::new("c0", vec![0.0]).with_metadata(meta.clone());

        let (id, metadata) = from_payload(to_payload(&record));
        assert_eq!(id.as_deref(), Some("c0"));
        assert_eq!(metadata, Some(meta));
    }

    #[test]
    fn test_empty_filter_is_omitted() {
        assert!(build_filter(&MetadataFilter::new()).is_none());
        assert!(build_filter(&MetadataFilter::new().eq("score", 0.5)).is_some());
    }
}
