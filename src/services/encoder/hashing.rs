//! Feature-hashing bi-encoder.

use sha2::{Digest, Sha256};

use super::{Encoder, validate_texts};
use crate::error::EncoderError;
use crate::models::{EncoderConfig, Vector};
use crate::utils::similarity::normalize;
use crate::utils::text::truncate_chars;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic encoder that hashes lower-cased words and character
/// trigrams into `dimension` signed buckets, then L2-normalizes.
///
/// Needs no model files, is stateless and cheap, so it serves as the default
/// encoder and as a reproducible stand-in for a real model in tests.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
    max_chars: usize,
}

impl HashingEncoder {
    /// `dimension` is clamped to at least 1.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            max_chars: usize::MAX,
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.dimension as usize).with_max_chars(config.max_chars as usize)
    }

    /// Inputs longer than `max_chars` characters are cut to that prefix.
    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    /// Raw (unnormalized) feature vector of one text.
    pub(crate) fn features(&self, text: &str) -> Vector {
        let text = truncate_chars(text, self.max_chars);
        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimension];

        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            // Punctuation-only text still gets a deterministic signature
            self.add_feature(&mut vector, "raw", lowered.trim(), WORD_WEIGHT);
            return vector;
        }

        for word in words {
            self.add_feature(&mut vector, "w", word, WORD_WEIGHT);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for trigram in padded.windows(3) {
                let trigram: String = trigram.iter().collect();
                self.add_feature(&mut vector, "c", &trigram, TRIGRAM_WEIGHT);
            }
        }

        vector
    }

    fn add_feature(&self, vector: &mut [f32], kind: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }

    fn embed(&self, text: &str) -> Vector {
        normalize(&self.features(text))
    }
}

impl Encoder for HashingEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EncoderError> {
        validate_texts(texts)?;

        let truncated = texts
            .iter()
            .filter(|t| t.chars().count() > self.max_chars)
            .count();
        if truncated > 0 {
            tracing::debug!(
                truncated,
                max_chars = self.max_chars,
                "truncating over-length inputs"
            );
        }

        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::similarity::{cosine, norm};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_dimension_and_norm() {
        let encoder = HashingEncoder::new(64);
        let v = encoder.encode("the quick brown fox").unwrap();
        assert_eq!(v.len(), 64);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_batch_matches_single() {
        let encoder = HashingEncoder::new(32);
        let texts = strings(&["Hello world.", "How are you?", "!!!", "日本語"]);
        let batch = encoder.encode_batch(&texts).unwrap();

        assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&encoder.encode(text).unwrap(), vector);
        }
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = HashingEncoder::new(16).encode("retrieval").unwrap();
        let b = HashingEncoder::new(16).encode("retrieval").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let encoder = HashingEncoder::new(256);
        let query = encoder.encode("vector database index").unwrap();
        let close = encoder.encode("an index in a vector database").unwrap();
        let far = encoder.encode("baking sourdough bread at home").unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn test_malformed_element_fails_batch() {
        let encoder = HashingEncoder::new(8);
        let err = encoder
            .encode_batch(&strings(&["fine", "also fine", ""]))
            .unwrap_err();
        assert!(matches!(err, EncoderError::InvalidInput { index: 2, .. }));
    }

    #[test]
    fn test_truncation_is_deterministic_prefix() {
        let encoder = HashingEncoder::new(64).with_max_chars(10);
        let long = format!("0123456789{}", "tail ".repeat(100));
        assert_eq!(
            encoder.encode(&long).unwrap(),
            encoder.encode("0123456789").unwrap()
        );
    }
}
