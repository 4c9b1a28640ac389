/// ONNX Runtime embedder for all-MiniLM-L6-v2.
///
/// Runs the exported transformer, mean-pools `last_hidden_state` under the
/// attention mask and L2-normalises the result, matching the
/// sentence-transformers pipeline the index was built with.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::tokenizer::QueryTokenizer;
use super::{Embedder, EmbedderError};

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: QueryTokenizer,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn new(model_dir: &Path, dimensions: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime...");

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(2)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        let tokenizer = QueryTokenizer::from_model_dir(model_dir)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer error: {e}")))?;

        info!(
            "Embedding model loaded from {} (vocab size: {})",
            model_dir.display(),
            tokenizer.vocab_size()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let encoded = self
            .tokenizer
            .encode(text)
            .map_err(|e| EmbedderError::TokenizerError(e.to_string()))?;
        let seq_len = encoded.len();

        let input_ids = Tensor::from_array(([1usize, seq_len], encoded.input_ids))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask = Tensor::from_array(([1usize, seq_len], encoded.attention_mask.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")))?;
        let token_type_ids = Tensor::from_array(([1usize, seq_len], encoded.token_type_ids))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // last_hidden_state: [1, seq_len, hidden]
        let (_shape, hidden) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        if hidden.len() != seq_len * self.dimensions {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected hidden size {}, model produced {} values for {seq_len} tokens",
                self.dimensions,
                hidden.len()
            )));
        }

        let pooled = mean_pooling(hidden, &encoded.attention_mask, seq_len, self.dimensions);
        Ok(l2_normalize(&pooled))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden` is a flat array with shape `[1, seq_len, hidden_size]`.
fn mean_pooling(hidden: &[f32], attention_mask: &[i64], seq_len: usize, hidden_size: usize) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum = 0.0f32;

    for (t, &m) in attention_mask.iter().enumerate().take(seq_len) {
        let mask = m as f32;
        mask_sum += mask;
        let row = &hidden[t * hidden_size..(t + 1) * hidden_size];
        for (acc, v) in result.iter_mut().zip(row) {
            *acc += v * mask;
        }
    }

    // sentence-transformers clamps the denominator the same way
    let denom = mask_sum.max(1e-9);
    for v in &mut result {
        *v /= denom;
    }

    result
}

/// L2-normalize a vector, returning the normalized copy.
pub(crate) fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}
