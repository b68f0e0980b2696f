//! Chunk → encode → index, and query → encode → search → re-rank.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{EncoderError, IndexError, PipelineError};
use crate::models::{
    BatchReport, EmbeddingRecord, Metadata, MetadataFilter, SearchHit, SearchResults, Vector,
};
use crate::services::chunker::Chunker;
use crate::services::encoder::{Encoder, PairEncoder};
use crate::services::index::VectorIndex;

/// Metadata field holding the chunk text.
pub const TEXT_FIELD: &str = "text";
pub const CHUNK_INDEX_FIELD: &str = "chunk_index";
pub const DOC_ID_FIELD: &str = "doc_id";

/// Wires a chunker, an encoder and an index together, with an optional
/// cross-encoder for second-stage re-ranking.
#[derive(Clone)]
pub struct Pipeline {
    chunker: Arc<dyn Chunker>,
    encoder: Arc<dyn Encoder>,
    index: VectorIndex,
    reranker: Option<Arc<dyn PairEncoder>>,
    rerank_candidates: usize,
}

impl Pipeline {
    /// Fails when the encoder and index dimensions differ.
    pub fn new(
        chunker: Arc<dyn Chunker>,
        encoder: Arc<dyn Encoder>,
        index: VectorIndex,
    ) -> Result<Self, PipelineError> {
        if encoder.dimension() != index.dimension() {
            return Err(IndexError::DimensionMismatch {
                index: index.name().to_string(),
                expected: index.dimension(),
                actual: encoder.dimension(),
            }
            .into());
        }

        Ok(Self {
            chunker,
            encoder,
            index,
            reranker: None,
            rerank_candidates: 20,
        })
    }

    /// Re-score up to `candidates` first-stage hits with `reranker`.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn PairEncoder>, candidates: usize) -> Self {
        self.reranker = Some(reranker);
        self.rerank_candidates = candidates.max(1);
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn chunker(&self) -> &Arc<dyn Chunker> {
        &self.chunker
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Chunk, encode and upsert one document. Chunk `i` is stored as
    /// `{doc_id}:{i}` with its text, position and `metadata`.
    ///
    /// Encoding failures abort the document; index failures are reported per
    /// chunk in the returned [`BatchReport`].
    pub async fn ingest(
        &self,
        doc_id: &str,
        text: &str,
        metadata: Option<Metadata>,
    ) -> Result<BatchReport, PipelineError> {
        if doc_id.is_empty() {
            return Err(IndexError::InvalidInput("document id must not be empty".to_string()).into());
        }

        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            tracing::debug!(doc_id, "document has no content, nothing to ingest");
            return Ok(BatchReport::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.encode_blocking(texts).await?;

        let base = metadata.unwrap_or_default();
        let records: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut meta = base.clone();
                meta.insert(DOC_ID_FIELD.to_string(), doc_id.into());
                meta.insert(CHUNK_INDEX_FIELD.to_string(), (chunk.index as i64).into());
                meta.insert("start".to_string(), (chunk.start as i64).into());
                meta.insert("end".to_string(), (chunk.end as i64).into());
                meta.insert(TEXT_FIELD.to_string(), chunk.text.into());
                EmbeddingRecord::new(format!("{doc_id}:{}", chunk.index), vector)
                    .with_metadata(meta)
            })
            .collect();

        let report = self.index.upsert_batch(records).await;
        tracing::debug!(
            doc_id,
            chunks = report.total(),
            failed = report.failed.len(),
            "ingested document"
        );
        Ok(report)
    }

    /// Search for `query`, re-ranking when asked and a re-ranker is present.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
        rerank: bool,
    ) -> Result<SearchResults, PipelineError> {
        let start = Instant::now();

        if query.trim().is_empty() {
            return Err(PipelineError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(PipelineError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        let reranker = self.reranker.as_ref().filter(|_| rerank);
        let candidates = match reranker {
            Some(_) => top_k.max(self.rerank_candidates),
            None => top_k,
        };

        let encoder = Arc::clone(&self.encoder);
        let owned = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || encoder.encode_query(&owned))
            .await
            .map_err(|e| EncoderError::InferenceError(e.to_string()))??;

        let matches = self.index.query(&query_vector, candidates, filter).await?;
        let mut hits: Vec<SearchHit> = matches
            .into_iter()
            .map(|m| {
                let text = m
                    .metadata
                    .as_ref()
                    .and_then(|meta| meta.get(TEXT_FIELD))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                SearchHit {
                    id: m.id,
                    score: m.score,
                    index_score: m.score,
                    text,
                    metadata: m.metadata,
                }
            })
            .collect();

        let reranked = match reranker {
            Some(reranker) if !hits.is_empty() => {
                self.rerank(reranker, query, &mut hits).await?;
                true
            }
            _ => false,
        };
        hits.truncate(top_k);

        Ok(SearchResults::new(
            query.to_string(),
            hits,
            reranked,
            start.elapsed().as_millis() as u64,
        ))
    }

    async fn rerank(
        &self,
        reranker: &Arc<dyn PairEncoder>,
        query: &str,
        hits: &mut [SearchHit],
    ) -> Result<(), PipelineError> {
        if reranker.mode().is_training() {
            return Err(EncoderError::WrongMode {
                expected: crate::models::EncoderMode::Inference,
                actual: reranker.mode(),
            }
            .into());
        }

        let queries = vec![query.to_string(); hits.len()];
        // Hits stored without text are scored on their id
        let candidates: Vec<String> = hits
            .iter()
            .map(|h| h.text.clone().unwrap_or_else(|| h.id.clone()))
            .collect();

        let reranker = Arc::clone(reranker);
        let scores = tokio::task::spawn_blocking(move || reranker.encode_pairs(&queries, &candidates))
            .await
            .map_err(|e| EncoderError::InferenceError(e.to_string()))??;

        for (hit, score) in hits.iter_mut().zip(scores) {
            hit.score = score;
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        Ok(())
    }

    /// Encoders may run a model; keep them off the async workers.
    async fn encode_blocking(&self, texts: Vec<String>) -> Result<Vec<Vector>, PipelineError> {
        let encoder = Arc::clone(&self.encoder);
        let vectors = tokio::task::spawn_blocking(move || encoder.encode_batch(&texts))
            .await
            .map_err(|e| EncoderError::InferenceError(e.to_string()))??;
        Ok(vectors)
    }
}
