//! Index descriptors: name, dimensionality, metric and placement hints.

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Maximum length of an index name.
pub const MAX_INDEX_NAME_LEN: usize = 63;

/// Similarity metric an index ranks by. Scores are always "higher is closer".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    #[serde(alias = "dot")]
    DotProduct,
    Euclidean,
}

impl Metric {
    /// Similarity of two equal-length vectors under this metric.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => crate::utils::similarity::cosine(a, b),
            Metric::DotProduct => crate::utils::similarity::dot(a, b),
            Metric::Euclidean => {
                crate::utils::similarity::distance_to_score(crate::utils::similarity::euclidean(
                    a, b,
                ))
            }
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "dot" | "dotproduct" | "dot-product" | "dot_product" => Ok(Metric::DotProduct),
            "euclidean" | "euclid" | "l2" => Ok(Metric::Euclidean),
            _ => Err(format!("unknown metric: {s}")),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::DotProduct => write!(f, "dotproduct"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Topology hints passed through to backends that understand them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default = "default_one")]
    pub shards: u32,

    #[serde(default = "default_one")]
    pub replicas: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

fn default_one() -> u32 {
    1
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            shards: 1,
            replicas: 1,
            region: None,
        }
    }
}

/// Immutable description of a named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    #[serde(default)]
    pub placement: Placement,
}

impl IndexDescriptor {
    /// Build a validated descriptor.
    pub fn new(
        name: impl Into<String>,
        dimension: usize,
        metric: Metric,
        placement: Placement,
    ) -> Result<Self, IndexError> {
        let name = name.into();
        validate_index_name(&name)?;

        if dimension == 0 {
            return Err(IndexError::InvalidInput(format!(
                "index '{name}': dimension must be greater than zero"
            )));
        }
        if placement.shards == 0 || placement.replicas == 0 {
            return Err(IndexError::InvalidInput(format!(
                "index '{name}': shards and replicas must be at least 1"
            )));
        }

        Ok(Self {
            name,
            dimension,
            metric,
            placement,
        })
    }

    /// Check that an existing index is compatible with this request.
    ///
    /// Placement hints are advisory and do not conflict.
    pub fn check_compatible(&self, existing: &IndexDescriptor) -> Result<(), IndexError> {
        if existing.dimension != self.dimension {
            return Err(IndexError::ConfigConflict(format!(
                "index '{}' exists with dimension {}, requested {}",
                self.name, existing.dimension, self.dimension
            )));
        }
        if existing.metric != self.metric {
            return Err(IndexError::ConfigConflict(format!(
                "index '{}' exists with metric {}, requested {}",
                self.name, existing.metric, self.metric
            )));
        }
        Ok(())
    }
}

/// Index names are 1..=63 chars of `[a-z0-9_-]` starting with an alphanumeric,
/// so they are valid as Qdrant collection and PostgreSQL table suffixes.
pub fn validate_index_name(name: &str) -> Result<(), IndexError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    let valid_start = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    if name.is_empty() || name.len() > MAX_INDEX_NAME_LEN || !valid_chars || !valid_start {
        return Err(IndexError::InvalidInput(format!(
            "invalid index name '{name}': use 1-{MAX_INDEX_NAME_LEN} characters of [a-z0-9_-]"
        )));
    }
    Ok(())
}
