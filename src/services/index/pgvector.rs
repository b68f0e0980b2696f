//! PostgreSQL + pgvector index backend.

use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector as PgVector;
use sha2::{Digest, Sha256};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;

use super::{CreateOutcome, IndexBackend};
use crate::error::IndexError;
use crate::models::{
    EmbeddingRecord, IndexConfig, IndexDescriptor, Metadata, MetadataFilter, Metric, Placement,
    QueryMatch, VectorDriver,
};

const REGISTRY_TABLE: &str = "rcore_indexes";

/// PostgreSQL backend.
///
/// A registry table records each index's descriptor; records live in one
/// table per index with columns `(id TEXT, embedding vector(n), metadata JSONB)`.
pub struct PgVectorBackend {
    pool: PgPool,
    schema: Option<String>,
}

impl PgVectorBackend {
    pub async fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| IndexError::from_backend("connect", format!("connection: {e}")))?;

        let backend = Self {
            pool,
            schema: config.schema.clone(),
        };

        backend.check_pgvector_extension().await?;

        if let Some(ref schema) = backend.schema {
            backend.ensure_schema(schema).await?;
        }
        backend.ensure_registry().await?;

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), IndexError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IndexError::from_backend("connect", e.to_string()))?;

        if result.is_none() {
            return Err(IndexError::Backend {
                operation: "connect".to_string(),
                message: "pgvector extension is not installed. Run: CREATE EXTENSION vector;"
                    .to_string(),
            });
        }

        Ok(())
    }

    async fn ensure_schema(&self, schema: &str) -> Result<(), IndexError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema));
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("connect", e.to_string()))?;
        Ok(())
    }

    async fn ensure_registry(&self) -> Result<(), IndexError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL,
                shards INTEGER NOT NULL DEFAULT 1,
                replicas INTEGER NOT NULL DEFAULT 1,
                region TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            self.qualify(REGISTRY_TABLE)
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("connect", e.to_string()))?;
        Ok(())
    }

    fn qualify(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote(schema), quote(table)),
            None => quote(table),
        }
    }

    fn records_table(&self, index: &str) -> String {
        self.qualify(&table_name(index))
    }
}

/// Per-index table name. Hashing keeps it within PostgreSQL's 63-byte
/// identifier limit and free of collisions between `-` and `_`.
fn table_name(index: &str) -> String {
    let digest = hex::encode(Sha256::digest(index.as_bytes()));
    format!("rcore_{}", &digest[..24])
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn ops_class(metric: Metric) -> &'static str {
    match metric {
        Metric::Cosine => "vector_cosine_ops",
        Metric::DotProduct => "vector_ip_ops",
        Metric::Euclidean => "vector_l2_ops",
    }
}

/// `(distance operator, score expression)` for a metric. `<#>` is the
/// negated inner product.
fn distance_sql(metric: Metric) -> (&'static str, &'static str) {
    match metric {
        Metric::Cosine => ("<=>", "1 - (embedding <=> $1)"),
        Metric::DotProduct => ("<#>", "-(embedding <#> $1)"),
        Metric::Euclidean => ("<->", "1 / (1 + (embedding <-> $1))"),
    }
}

fn filter_documents(filter: &MetadataFilter) -> Vec<serde_json::Value> {
    filter
        .must
        .iter()
        .map(|(key, value)| {
            let mut object = serde_json::Map::new();
            object.insert(
                key.clone(),
                serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            );
            serde_json::Value::Object(object)
        })
        .collect()
}

#[async_trait]
impl IndexBackend for PgVectorBackend {
    fn driver(&self) -> VectorDriver {
        VectorDriver::PostgreSQL
    }

    async fn list_index_names(&self) -> Result<Vec<String>, IndexError> {
        let query = format!(
            "SELECT name FROM {} ORDER BY name",
            self.qualify(REGISTRY_TABLE)
        );
        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("list_indexes", e.to_string()))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescriptor>, IndexError> {
        let query = format!(
            "SELECT dimension, metric, shards, replicas, region FROM {} WHERE name = $1",
            self.qualify(REGISTRY_TABLE)
        );
        let row: Option<(i32, String, i32, i32, Option<String>)> = sqlx::query_as(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("describe_index", e.to_string()))?;

        let Some((dimension, metric, shards, replicas, region)) = row else {
            return Ok(None);
        };

        let metric: Metric = metric.parse().map_err(|e: String| IndexError::Backend {
            operation: "describe_index".to_string(),
            message: e,
        })?;
        let placement = Placement {
            shards: shards.max(1) as u32,
            replicas: replicas.max(1) as u32,
            region,
        };

        IndexDescriptor::new(name, dimension.max(0) as usize, metric, placement).map(Some)
    }

    async fn create_index(
        &self,
        descriptor: &IndexDescriptor,
    ) -> Result<CreateOutcome, IndexError> {
        let map_err = |e: sqlx::Error| IndexError::from_backend("create_index", e.to_string());
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let register = format!(
            r#"
            INSERT INTO {} (name, dimension, metric, shards, replicas, region)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            "#,
            self.qualify(REGISTRY_TABLE)
        );
        let inserted = sqlx::query(&register)
            .bind(&descriptor.name)
            .bind(descriptor.dimension as i32)
            .bind(descriptor.metric.to_string())
            .bind(descriptor.placement.shards as i32)
            .bind(descriptor.placement.replicas as i32)
            .bind(&descriptor.placement.region)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?
            .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(map_err)?;
            return Ok(CreateOutcome::AlreadyExists);
        }

        let table = self.records_table(&descriptor.name);
        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    embedding vector({}) NOT NULL,
                    metadata JSONB
                )
                "#,
                descriptor.dimension
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {table} USING hnsw (embedding {})",
                quote(&format!("{}_embedding_idx", table_name(&descriptor.name))),
                ops_class(descriptor.metric)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {table} USING GIN (metadata)",
                quote(&format!("{}_metadata_idx", table_name(&descriptor.name)))
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(CreateOutcome::Created)
    }

    async fn drop_index(&self, name: &str) -> Result<bool, IndexError> {
        let map_err = |e: sqlx::Error| IndexError::from_backend("drop_index", e.to_string());
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let unregister = format!(
            "DELETE FROM {} WHERE name = $1",
            self.qualify(REGISTRY_TABLE)
        );
        let removed = sqlx::query(&unregister)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?
            .rows_affected();

        let drop = format!("DROP TABLE IF EXISTS {}", self.records_table(name));
        sqlx::query(&drop)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;
        Ok(removed > 0)
    }

    async fn upsert(
        &self,
        index: &IndexDescriptor,
        records: &[EmbeddingRecord],
    ) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let map_err = |e: sqlx::Error| IndexError::from_backend("upsert", e.to_string());
        let query = format!(
            r#"
            INSERT INTO {} (id, embedding, metadata)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                embedding = EXCLUDED.embedding,
                metadata = EXCLUDED.metadata
            "#,
            self.records_table(&index.name)
        );

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        for record in records {
            sqlx::query(&query)
                .bind(&record.id)
                .bind(PgVector::from(record.vector.clone()))
                .bind(record.metadata.as_ref().map(Json))
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn query(
        &self,
        index: &IndexDescriptor,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let (operator, score) = distance_sql(index.metric);
        let conditions = filter.map(filter_documents).unwrap_or_default();

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = (0..conditions.len())
                .map(|i| format!("metadata @> ${}", i + 2))
                .collect();
            format!("WHERE {}", parts.join(" AND "))
        };

        let query = format!(
            r#"
            SELECT id, ({score})::float8 AS score, metadata
            FROM {}
            {where_clause}
            ORDER BY embedding {operator} $1, id
            LIMIT {top_k}
            "#,
            self.records_table(&index.name)
        );

        let mut query_builder = sqlx::query(&query).bind(PgVector::from(vector.to_vec()));
        for condition in conditions {
            query_builder = query_builder.bind(Json(condition));
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("query", e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row: PgRow| {
                let score: f64 = row.get("score");
                let metadata: Option<Json<Metadata>> = row.get("metadata");
                QueryMatch {
                    id: row.get("id"),
                    score: score as f32,
                    metadata: metadata.map(|m| m.0),
                }
            })
            .collect())
    }

    async fn fetch(
        &self,
        index: &IndexDescriptor,
        id: &str,
    ) -> Result<Option<EmbeddingRecord>, IndexError> {
        let query = format!(
            "SELECT embedding, metadata FROM {} WHERE id = $1",
            self.records_table(&index.name)
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("fetch", e.to_string()))?;

        Ok(row.map(|row: PgRow| {
            let embedding: PgVector = row.get("embedding");
            let metadata: Option<Json<Metadata>> = row.get("metadata");
            EmbeddingRecord {
                id: id.to_string(),
                vector: embedding.to_vec(),
                metadata: metadata.map(|m| m.0),
            }
        }))
    }

    async fn delete(&self, index: &IndexDescriptor, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }

        let query = format!(
            "DELETE FROM {} WHERE id = ANY($1)",
            self.records_table(&index.name)
        );
        sqlx::query(&query)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("delete", e.to_string()))?;
        Ok(())
    }

    async fn delete_all(&self, index: &IndexDescriptor) -> Result<(), IndexError> {
        let query = format!("TRUNCATE TABLE {}", self.records_table(&index.name));
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("delete_all", e.to_string()))?;
        Ok(())
    }

    async fn count(&self, index: &IndexDescriptor) -> Result<u64, IndexError> {
        let query = format!(
            "SELECT COUNT(*) FROM {}",
            self.records_table(&index.name)
        );
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::from_backend("count", e.to_string()))?;
        Ok(row.0.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_are_distinct_and_bounded() {
        let a = table_name("my-docs");
        let b = table_name("my_docs");
        assert_ne!(a, b);
        assert!(a.len() <= 63);
        assert_eq!(a, table_name("my-docs"));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("docs"), "\"docs\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_filter_documents_one_per_condition() {
        let filter = MetadataFilter::new().eq("lang", "en").eq("page", 2i64);
        let docs = filter_documents(&filter);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], serde_json::json!({"lang": "en"}));
        assert_eq!(docs[1], serde_json::json!({"page": 2}));
    }
}
