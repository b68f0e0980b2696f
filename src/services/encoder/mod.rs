//! Text encoders.
//!
//! Two capability shapes:
//! - [`Encoder`] embeds one text at a time into a fixed-dimension vector
//!   (bi-encoder), used for chunks and queries.
//! - [`PairEncoder`] scores a (query, candidate) pair jointly
//!   (cross-encoder), used to re-rank first-stage hits.
//!
//! Single-text encoders are inference-only and shared as `Arc<dyn Encoder>`.
//! Pair encoders carry an explicit [`EncoderMode`]; training needs `&mut`
//! access, so a training encoder always has exactly one owner.

mod cross;
mod hashing;
mod onnx;
mod pair;

pub use cross::OnnxCrossEncoder;
pub use hashing::HashingEncoder;
pub use onnx::OnnxEncoder;
pub use pair::HashingPairEncoder;

use std::sync::Arc;

use crate::error::EncoderError;
use crate::models::{EncoderConfig, EncoderKind, EncoderMode, RerankerKind, Vector};
use crate::utils::text::malformed_reason;

/// Single-text encoder.
///
/// `encode_batch(texts)[i]` equals `encode(&texts[i])` for every `i`;
/// batching only changes throughput.
pub trait Encoder: Send + Sync {
    /// Length of every vector this encoder produces.
    fn dimension(&self) -> usize;

    /// Encode a batch. A malformed element fails the whole batch with its
    /// index; nothing is skipped.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EncoderError>;

    fn encode(&self, text: &str) -> Result<Vector, EncoderError> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::InferenceError("empty embedding output".to_string()))
    }

    /// Encode a search query. Instruction-tuned models override this to add
    /// their query prefix; by default it is [`Encoder::encode`].
    fn encode_query(&self, query: &str) -> Result<Vector, EncoderError> {
        self.encode(query)
    }

    /// Single-text encoders never mutate parameters.
    fn mode(&self) -> EncoderMode {
        EncoderMode::Inference
    }

    fn name(&self) -> &str;
}

/// Paired-text (cross) encoder producing one relevance score per pair.
pub trait PairEncoder: Send + Sync {
    fn mode(&self) -> EncoderMode;

    /// Switch to training mode. Fails for inference-only encoders.
    fn set_train_mode(&mut self) -> Result<(), EncoderError>;

    /// Switch to inference mode, discarding any accumulated training state.
    fn set_eval_mode(&mut self);

    /// Score `queries[i]` against `candidates[i]`. Unequal lengths fail with
    /// [`EncoderError::LengthMismatch`] before anything is encoded.
    fn encode_pairs(
        &self,
        queries: &[String],
        candidates: &[String],
    ) -> Result<Vec<f32>, EncoderError>;

    fn encode_pair(&self, query: &str, candidate: &str) -> Result<f32, EncoderError> {
        self.encode_pairs(&[query.to_string()], &[candidate.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::InferenceError("empty score output".to_string()))
    }

    fn name(&self) -> &str;
}

/// Pair encoders whose parameters can be updated.
pub trait TrainablePairEncoder: PairEncoder {
    /// One gradient step on labelled pairs (`labels[i]` in `[0, 1]`).
    /// Requires [`EncoderMode::Training`]. Returns the mean loss before the
    /// update.
    fn train_step(
        &mut self,
        queries: &[String],
        candidates: &[String],
        labels: &[f32],
        learning_rate: f32,
    ) -> Result<f32, EncoderError>;
}

/// Fail on the first malformed element, naming its index.
pub fn validate_texts(texts: &[String]) -> Result<(), EncoderError> {
    for (index, text) in texts.iter().enumerate() {
        if let Some(reason) = malformed_reason(text) {
            return Err(EncoderError::InvalidInput {
                index,
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a paired batch: equal lengths first, then each element.
pub fn validate_pairs(queries: &[String], candidates: &[String]) -> Result<(), EncoderError> {
    if queries.len() != candidates.len() {
        return Err(EncoderError::LengthMismatch {
            queries: queries.len(),
            candidates: candidates.len(),
        });
    }
    validate_texts(queries)?;
    validate_texts(candidates)
}

/// Build the single-text encoder selected by configuration.
pub fn build_encoder(config: &EncoderConfig) -> Result<Arc<dyn Encoder>, EncoderError> {
    match config.kind {
        EncoderKind::Hashing => Ok(Arc::new(HashingEncoder::from_config(config))),
        EncoderKind::Onnx => {
            let model_dir = config.model_dir.as_deref().ok_or_else(|| {
                EncoderError::NotFound("encoder.model_dir is required for onnx".to_string())
            })?;
            Ok(Arc::new(OnnxEncoder::load(config, model_dir)?))
        }
    }
}

/// Build the re-ranker selected by configuration, if any. The returned
/// encoder is in inference mode.
pub fn build_reranker(
    config: &EncoderConfig,
) -> Result<Option<Arc<dyn PairEncoder>>, EncoderError> {
    match config.reranker.kind {
        RerankerKind::None => Ok(None),
        RerankerKind::Hashing => Ok(Some(Arc::new(HashingPairEncoder::new(
            config.dimension as usize,
            config.max_chars as usize,
        )))),
        RerankerKind::Onnx => {
            let model_dir = config.reranker.model_dir.as_deref().ok_or_else(|| {
                EncoderError::NotFound("encoder.reranker.model_dir is required for onnx".to_string())
            })?;
            Ok(Some(Arc::new(OnnxCrossEncoder::load(config, model_dir)?)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_validate_texts_reports_index() {
        let err = validate_texts(&strings(&["ok", "fine", "  ", "ok"])).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidInput { index: 2, .. }));
    }

    #[test]
    fn test_validate_pairs_checks_length_first() {
        let err = validate_pairs(&strings(&["a", "", "c"]), &strings(&["x", "y"])).unwrap_err();
        assert!(matches!(
            err,
            EncoderError::LengthMismatch {
                queries: 3,
                candidates: 2
            }
        ));
    }

    #[test]
    fn test_build_default_encoder() {
        let config = EncoderConfig::default();
        let encoder = build_encoder(&config).unwrap();
        assert_eq!(encoder.dimension(), config.dimension as usize);
        assert_eq!(encoder.mode(), EncoderMode::Inference);
        assert!(build_reranker(&config).unwrap().is_none());
    }

    #[test]
    fn test_onnx_requires_model_dir() {
        let config = EncoderConfig {
            kind: EncoderKind::Onnx,
            ..Default::default()
        };
        assert!(matches!(
            build_encoder(&config),
            Err(EncoderError::NotFound(_))
        ));
    }
}
