//! ONNX cross-encoder for re-ranking.

use std::path::Path;

use super::onnx::OnnxModel;
use super::{PairEncoder, validate_pairs};
use crate::error::EncoderError;
use crate::models::{EncoderConfig, EncoderMode};

/// Cross-encoder exported to ONNX. Query and candidate are tokenized as one
/// sequence pair and the model emits relevance logits.
///
/// A single logit column is squashed with a sigmoid; with two columns the
/// softmax probability of the second (relevant) class is used. The exported
/// graph carries no optimizer state, so this encoder is inference-only.
pub struct OnnxCrossEncoder {
    model: OnnxModel,
    batch_size: usize,
}

impl OnnxCrossEncoder {
    pub fn load(config: &EncoderConfig, model_dir: &Path) -> Result<Self, EncoderError> {
        let model = OnnxModel::load(model_dir, config.max_tokens as usize)?;
        tracing::info!(model_dir = %model_dir.display(), "loaded cross-encoder model");
        Ok(Self {
            model,
            batch_size: config.batch_size.max(1) as usize,
        })
    }

    fn score_chunk(&self, pairs: Vec<(String, String)>) -> Result<Vec<f32>, EncoderError> {
        let encodings = self.model.tokenize(pairs)?;
        let mut session = self.model.lock()?;
        let outputs = session
            .run(self.model.inputs(&encodings)?)
            .map_err(|e: ort::Error| EncoderError::InferenceError(e.to_string()))?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| EncoderError::InferenceError(e.to_string()))?;
        let shape = logits.shape().to_vec();

        match shape.as_slice() {
            [_] => Ok((0..encodings.len()).map(|i| sigmoid(logits[[i]])).collect()),
            [_, 1] => Ok((0..encodings.len())
                .map(|i| sigmoid(logits[[i, 0]]))
                .collect()),
            [_, 2] => Ok((0..encodings.len())
                .map(|i| {
                    let (neg, pos) = (logits[[i, 0]], logits[[i, 1]]);
                    sigmoid(pos - neg)
                })
                .collect()),
            _ => Err(EncoderError::InferenceError(format!(
                "unexpected logits shape: {shape:?}"
            ))),
        }
    }
}

/// Two-class softmax reduces to a sigmoid of the logit difference.
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl PairEncoder for OnnxCrossEncoder {
    fn mode(&self) -> EncoderMode {
        EncoderMode::Inference
    }

    fn set_train_mode(&mut self) -> Result<(), EncoderError> {
        Err(EncoderError::Unsupported(
            "ONNX cross-encoders are inference-only".to_string(),
        ))
    }

    fn set_eval_mode(&mut self) {}

    fn encode_pairs(
        &self,
        queries: &[String],
        candidates: &[String],
    ) -> Result<Vec<f32>, EncoderError> {
        validate_pairs(queries, candidates)?;

        let pairs: Vec<(String, String)> = queries
            .iter()
            .cloned()
            .zip(candidates.iter().cloned())
            .collect();

        let mut scores = Vec::with_capacity(pairs.len());
        for chunk in pairs.chunks(self.batch_size) {
            scores.extend(self.score_chunk(chunk.to_vec())?);
        }
        Ok(scores)
    }

    fn name(&self) -> &str {
        "onnx-cross"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_class_softmax_matches_sigmoid_of_difference() {
        let (neg, pos) = (0.3f32, 1.7f32);
        let softmax = pos.exp() / (pos.exp() + neg.exp());
        assert!((softmax - sigmoid(pos - neg)).abs() < 1e-6);
    }

    #[test]
    fn test_load_requires_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxCrossEncoder::load(&EncoderConfig::default(), dir.path());
        assert!(matches!(result, Err(EncoderError::NotFound(_))));
    }
}
