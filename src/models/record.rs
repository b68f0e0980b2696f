//! Records stored in a vector index and the filters that select them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed-length embedding vector.
pub type Vector = Vec<f32>;

/// Scalar metadata value attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Integer(n) => write!(f, "{n}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Record metadata, ordered by key so serialization is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata key some backends use to store the record id next to the payload.
/// Callers may not set it.
pub const RESERVED_ID_KEY: &str = "_id";

/// An (id, vector, metadata) triple owned by an index once upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vector,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Metadata>,
}

impl EmbeddingRecord {
    pub fn new(id: impl Into<String>, vector: Vector) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Look up a single metadata field.
    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// Conjunction of equality conditions on metadata fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub must: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.must.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// A record without metadata only matches an empty filter.
    pub fn matches(&self, metadata: Option<&Metadata>) -> bool {
        self.must.iter().all(|(key, expected)| {
            metadata
                .and_then(|m| m.get(key))
                .is_some_and(|actual| actual == expected)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_filter_matches_all_conditions() {
        let meta = metadata(&[
            ("lang", "en".into()),
            ("page", 3i64.into()),
            ("draft", false.into()),
        ]);

        assert!(MetadataFilter::new().matches(Some(&meta)));
        assert!(MetadataFilter::new().eq("lang", "en").matches(Some(&meta)));
        assert!(
            MetadataFilter::new()
                .eq("lang", "en")
                .eq("page", 3i64)
                .matches(Some(&meta))
        );
        assert!(
            !MetadataFilter::new()
                .eq("lang", "en")
                .eq("draft", true)
                .matches(Some(&meta))
        );
    }

    #[test]
    fn test_filter_without_metadata() {
        assert!(MetadataFilter::new().matches(None));
        assert!(!MetadataFilter::new().eq("lang", "en").matches(None));
    }

    #[test]
    fn test_metadata_value_untagged_json() {
        let meta = metadata(&[("n", 7i64.into()), ("s", "x".into()), ("f", 0.5.into())]);
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"f":0.5,"n":7,"s":"x"}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
