//! ONNX bi-encoder with last-token pooling.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Axis;
use ort::session::{Session, SessionInputValue, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::{
    Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams, TruncationStrategy,
};

use super::{Encoder, validate_texts};
use crate::error::EncoderError;
use crate::models::{EncoderConfig, Vector};
use crate::utils::similarity::normalize;

const DEFAULT_QUERY_INSTRUCTION: &str =
    "Instruct: Given a search query, retrieve relevant passages\nQuery: ";

/// Sentence-embedding model exported to ONNX (`model.onnx` plus
/// `tokenizer.json` in one directory).
///
/// Inputs are fed by name, so models with or without `position_ids` /
/// `token_type_ids` both work. A `[batch, seq, hidden]` output is pooled at
/// the last attended token; a `[batch, hidden]` output is used as is.
pub struct OnnxEncoder {
    model: OnnxModel,
    dimension: usize,
    batch_size: usize,
    query_instruction: String,
}

impl OnnxEncoder {
    pub fn load(config: &EncoderConfig, model_dir: &Path) -> Result<Self, EncoderError> {
        let model = OnnxModel::load(model_dir, config.max_tokens as usize)?;
        tracing::info!(
            model_dir = %model_dir.display(),
            inputs = ?model.input_names,
            "loaded embedding model"
        );

        Ok(Self {
            model,
            dimension: config.dimension as usize,
            batch_size: config.batch_size.max(1) as usize,
            query_instruction: config
                .query_instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_QUERY_INSTRUCTION.to_string()),
        })
    }

    fn embed_chunk(&self, texts: Vec<String>) -> Result<Vec<Vector>, EncoderError> {
        let encodings = self.model.tokenize(texts)?;
        let mut session = self.model.lock()?;
        let outputs = session
            .run(self.model.inputs(&encodings)?)
            .map_err(|e: ort::Error| EncoderError::InferenceError(e.to_string()))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| EncoderError::InferenceError(e.to_string()))?;
        let shape = output.shape().to_vec();

        let hidden = *shape.last().unwrap_or(&0);
        if hidden != self.dimension {
            return Err(EncoderError::DimensionMismatch {
                expected: self.dimension,
                actual: hidden,
            });
        }

        match shape.len() {
            3 => Ok(output
                .outer_iter()
                .zip(&encodings)
                .map(|(sequence, encoding)| {
                    let pooled: Vector = sequence
                        .index_axis(Axis(0), last_token(encoding))
                        .iter()
                        .copied()
                        .collect();
                    normalize(&pooled)
                })
                .collect()),
            2 => Ok(output
                .outer_iter()
                .map(|row| normalize(&row.iter().copied().collect::<Vector>()))
                .collect()),
            _ => Err(EncoderError::InferenceError(format!(
                "unexpected output shape: {shape:?}"
            ))),
        }
    }
}

impl Encoder for OnnxEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vector>, EncoderError> {
        validate_texts(texts)?;

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_chunk(chunk.to_vec())?);
        }
        Ok(vectors)
    }

    fn encode_query(&self, query: &str) -> Result<Vector, EncoderError> {
        validate_texts(&[query.to_string()])?;
        self.embed_chunk(vec![format!("{}{}", self.query_instruction, query)])?
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::InferenceError("empty embedding output".to_string()))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Index of the last attended token. Padding is on the right, so this is
/// the attention-mask sum minus one rather than the padded length.
fn last_token(encoding: &Encoding) -> usize {
    let attended = encoding
        .get_attention_mask()
        .iter()
        .filter(|&&m| m != 0)
        .count();
    attended.saturating_sub(1)
}

/// Session and tokenizer pair shared by the ONNX bi- and cross-encoders.
pub(super) struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    input_names: Vec<String>,
}

impl OnnxModel {
    pub(super) fn load(model_dir: &Path, max_tokens: usize) -> Result<Self, EncoderError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(EncoderError::NotFound(format!(
                "model not found: {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(EncoderError::NotFound(format!(
                "tokenizer not found: {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| EncoderError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| EncoderError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| EncoderError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| EncoderError::LoadError(e.to_string()))?;

        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EncoderError::TokenizerError(e.to_string()))?;

        // Over-length inputs are cut to the first max_tokens tokens
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens.max(1),
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| EncoderError::TokenizerError(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            input_names,
        })
    }

    pub(super) fn tokenize<I>(&self, inputs: Vec<I>) -> Result<Vec<Encoding>, EncoderError>
    where
        I: Into<tokenizers::EncodeInput<'static>> + Send,
    {
        self.tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| EncoderError::TokenizerError(e.to_string()))
    }

    pub(super) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Session>, EncoderError> {
        self.session
            .lock()
            .map_err(|_| EncoderError::InferenceError("session lock poisoned".to_string()))
    }

    /// Build the named input tensors the session declares.
    pub(super) fn inputs(
        &self,
        encodings: &[Encoding],
    ) -> Result<Vec<(String, SessionInputValue<'static>)>, EncoderError> {
        let batch = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch * seq_len];
        let mut attention_mask = vec![0i64; batch * seq_len];
        let mut position_ids = vec![0i64; batch * seq_len];
        let mut type_ids = vec![0i64; batch * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            for (j, ((&id, &mask), &type_id)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[row + j] = id as i64;
                attention_mask[row + j] = mask as i64;
                position_ids[row + j] = j as i64;
                type_ids[row + j] = type_id as i64;
            }
        }

        let mut inputs = Vec::with_capacity(self.input_names.len());
        for name in &self.input_names {
            let data = match name.as_str() {
                "input_ids" => input_ids.clone(),
                "attention_mask" => attention_mask.clone(),
                "position_ids" => position_ids.clone(),
                "token_type_ids" => type_ids.clone(),
                other => {
                    return Err(EncoderError::Unsupported(format!(
                        "model input '{other}' is not supported"
                    )));
                }
            };
            let tensor = Tensor::from_array(([batch, seq_len], data))
                .map_err(|e: ort::Error| EncoderError::InferenceError(e.to_string()))?;
            inputs.push((name.clone(), tensor.into()));
        }

        Ok(inputs)
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxEncoder::load(&EncoderConfig::default(), dir.path());
        assert!(matches!(result, Err(EncoderError::NotFound(_))));
    }

    #[test]
    fn test_missing_tokenizer_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.onnx"), b"").unwrap();
        let result = OnnxModel::load(dir.path(), 16);
        assert!(matches!(result, Err(EncoderError::NotFound(_))));
    }
}
