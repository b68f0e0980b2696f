//! Trainable feature-hashing cross-encoder.

use super::{Encoder, HashingEncoder, PairEncoder, TrainablePairEncoder, validate_pairs};
use crate::error::EncoderError;
use crate::models::EncoderMode;
use crate::utils::similarity::normalize;

/// Logit scale applied to the weighted interaction.
const TEMPERATURE: f32 = 5.0;

/// Scores a pair as `sigmoid(T * Σ w_i q_i c_i + b)` over the hashed
/// features `q`, `c` of query and candidate.
///
/// With the initial weights (all 1, bias 0) the score is a monotone function
/// of the cosine between the two texts. `train_step` fits `w` and `b` with
/// binary cross-entropy; gradients accumulate in a buffer that only exists
/// in training mode.
#[derive(Debug, Clone)]
pub struct HashingPairEncoder {
    features: HashingEncoder,
    weights: Vec<f32>,
    bias: f32,
    mode: EncoderMode,
    grad: Option<Gradient>,
}

#[derive(Debug, Clone)]
struct Gradient {
    weights: Vec<f32>,
    bias: f32,
}

impl HashingPairEncoder {
    pub fn new(dimension: usize, max_chars: usize) -> Self {
        let features = HashingEncoder::new(dimension).with_max_chars(max_chars);
        let dimension = features.dimension();
        Self {
            features,
            weights: vec![1.0; dimension],
            bias: 0.0,
            mode: EncoderMode::Inference,
            grad: None,
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Element-wise product of the normalized query and candidate features.
    fn interaction(&self, query: &str, candidate: &str) -> Vec<f32> {
        let q = normalize(&self.features.features(query));
        let c = normalize(&self.features.features(candidate));
        q.iter().zip(&c).map(|(a, b)| a * b).collect()
    }

    fn logit(&self, interaction: &[f32]) -> f32 {
        let weighted: f32 = interaction
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum();
        TEMPERATURE * weighted + self.bias
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl PairEncoder for HashingPairEncoder {
    fn mode(&self) -> EncoderMode {
        self.mode
    }

    fn set_train_mode(&mut self) -> Result<(), EncoderError> {
        if self.mode.is_inference() {
            self.grad = Some(Gradient {
                weights: vec![0.0; self.weights.len()],
                bias: 0.0,
            });
            self.mode = EncoderMode::Training;
            tracing::debug!(encoder = self.name(), "switched to training mode");
        }
        Ok(())
    }

    fn set_eval_mode(&mut self) {
        if self.mode.is_training() {
            self.grad = None;
            self.mode = EncoderMode::Inference;
            tracing::debug!(encoder = self.name(), "switched to inference mode");
        }
    }

    fn encode_pairs(
        &self,
        queries: &[String],
        candidates: &[String],
    ) -> Result<Vec<f32>, EncoderError> {
        validate_pairs(queries, candidates)?;

        Ok(queries
            .iter()
            .zip(candidates)
            .map(|(q, c)| sigmoid(self.logit(&self.interaction(q, c))))
            .collect())
    }

    fn name(&self) -> &str {
        "hashing-pair"
    }
}

impl TrainablePairEncoder for HashingPairEncoder {
    fn train_step(
        &mut self,
        queries: &[String],
        candidates: &[String],
        labels: &[f32],
        learning_rate: f32,
    ) -> Result<f32, EncoderError> {
        if !self.mode.is_training() {
            return Err(EncoderError::WrongMode {
                expected: EncoderMode::Training,
                actual: self.mode,
            });
        }
        validate_pairs(queries, candidates)?;
        if labels.len() != queries.len() {
            return Err(EncoderError::InvalidInput {
                index: labels.len().min(queries.len()),
                reason: format!("expected {} labels, got {}", queries.len(), labels.len()),
            });
        }
        if let Some(index) = labels.iter().position(|y| !(0.0..=1.0).contains(y)) {
            return Err(EncoderError::InvalidInput {
                index,
                reason: format!("label {} is outside [0, 1]", labels[index]),
            });
        }
        if queries.is_empty() {
            return Ok(0.0);
        }

        let mut grad = self.grad.take().unwrap_or_else(|| Gradient {
            weights: vec![0.0; self.weights.len()],
            bias: 0.0,
        });

        let mut loss = 0.0;
        for ((q, c), &y) in queries.iter().zip(candidates).zip(labels) {
            let x = self.interaction(q, c);
            let p = sigmoid(self.logit(&x)).clamp(1e-6, 1.0 - 1e-6);
            loss -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();

            // d(BCE)/d(logit) = p - y
            let delta = p - y;
            for (g, xi) in grad.weights.iter_mut().zip(&x) {
                *g += delta * TEMPERATURE * xi;
            }
            grad.bias += delta;
        }

        let n = queries.len() as f32;
        for (w, g) in self.weights.iter_mut().zip(grad.weights.iter_mut()) {
            *w -= learning_rate * *g / n;
            *g = 0.0;
        }
        self.bias -= learning_rate * grad.bias / n;
        grad.bias = 0.0;
        self.grad = Some(grad);

        Ok(loss / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_starts_in_inference_mode() {
        let encoder = HashingPairEncoder::new(64, 1000);
        assert_eq!(encoder.mode(), EncoderMode::Inference);
    }

    #[test]
    fn test_mode_transitions_are_explicit_and_exclusive() {
        let mut encoder = HashingPairEncoder::new(64, 1000);

        encoder.set_train_mode().unwrap();
        assert_eq!(encoder.mode(), EncoderMode::Training);
        assert!(encoder.mode().is_training() && !encoder.mode().is_inference());

        encoder.set_eval_mode();
        assert_eq!(encoder.mode(), EncoderMode::Inference);
        assert!(encoder.mode().is_inference() && !encoder.mode().is_training());

        encoder.set_eval_mode();
        assert_eq!(encoder.mode(), EncoderMode::Inference);
    }

    #[test]
    fn test_length_mismatch_fails_before_encoding() {
        let encoder = HashingPairEncoder::new(64, 1000);
        let err = encoder
            .encode_pairs(&strings(&["a", "b", "c"]), &strings(&["x", "y"]))
            .unwrap_err();
        assert!(matches!(
            err,
            EncoderError::LengthMismatch {
                queries: 3,
                candidates: 2
            }
        ));
    }

    #[test]
    fn test_scores_prefer_related_candidates() {
        let encoder = HashingPairEncoder::new(256, 1000);
        let scores = encoder
            .encode_pairs(
                &strings(&["vector index query", "vector index query"]),
                &strings(&["query a vector index", "chocolate cake recipe"]),
            )
            .unwrap();
        assert!(scores[0] > scores[1]);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_pair_matches_batch() {
        let encoder = HashingPairEncoder::new(64, 1000);
        let queries = strings(&["one", "two"]);
        let candidates = strings(&["uno", "dos"]);
        let batch = encoder.encode_pairs(&queries, &candidates).unwrap();
        for i in 0..2 {
            assert_eq!(encoder.encode_pair(&queries[i], &candidates[i]).unwrap(), batch[i]);
        }
    }

    #[test]
    fn test_train_step_requires_training_mode() {
        let mut encoder = HashingPairEncoder::new(64, 1000);
        let err = encoder
            .train_step(&strings(&["q"]), &strings(&["c"]), &[1.0], 0.1)
            .unwrap_err();
        assert!(matches!(
            err,
            EncoderError::WrongMode {
                expected: EncoderMode::Training,
                actual: EncoderMode::Inference
            }
        ));
        assert!(encoder.weights().iter().all(|w| *w == 1.0));
    }

    #[test]
    fn test_training_moves_scores_toward_labels() {
        let mut encoder = HashingPairEncoder::new(128, 1000);
        let queries = strings(&["rust borrow checker", "rust borrow checker"]);
        let candidates = strings(&["ownership and borrowing in rust", "garden tomato care"]);
        let labels = [1.0, 0.0];

        let before = encoder.encode_pairs(&queries, &candidates).unwrap();

        encoder.set_train_mode().unwrap();
        let first_loss = encoder
            .train_step(&queries, &candidates, &labels, 0.5)
            .unwrap();
        let mut last_loss = first_loss;
        for _ in 0..50 {
            last_loss = encoder
                .train_step(&queries, &candidates, &labels, 0.5)
                .unwrap();
        }
        encoder.set_eval_mode();

        let after = encoder.encode_pairs(&queries, &candidates).unwrap();
        assert!(last_loss < first_loss);
        assert!(after[0] > before[0]);
        assert!(after[1] < before[1]);
    }

    #[test]
    fn test_train_step_validates_labels() {
        let mut encoder = HashingPairEncoder::new(32, 1000);
        encoder.set_train_mode().unwrap();

        let err = encoder
            .train_step(&strings(&["q"]), &strings(&["c"]), &[], 0.1)
            .unwrap_err();
        assert!(matches!(err, EncoderError::InvalidInput { .. }));

        let err = encoder
            .train_step(&strings(&["q"]), &strings(&["c"]), &[2.0], 0.1)
            .unwrap_err();
        assert!(matches!(err, EncoderError::InvalidInput { index: 0, .. }));
    }
}
