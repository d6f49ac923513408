//! Local sentence-transformer embeddings via tract
//!
//! Expects a directory holding an exported BERT-style model (`model.onnx`,
//! taking `input_ids`, `attention_mask` and `token_type_ids`) and its
//! HuggingFace `tokenizer.json`. Token embeddings are mean-pooled over the
//! attention mask and L2-normalized, matching the sentence-transformers
//! recipe for all-MiniLM-L6-v2.

use async_trait::async_trait;
use medrag_core::{EmbeddingConfig, RagError, Result};
use std::path::Path;
use std::sync::Arc;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tract_onnx::prelude::*;

use crate::embedding::EmbeddingClient;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

struct LocalModel {
    model: TractModel,
    tokenizer: Tokenizer,
}

/// Embedding client running an ONNX model in-process
pub struct LocalEmbedding {
    inner: Arc<LocalModel>,
    model_name: String,
    dimension: usize,
}

fn load_error(what: &str, e: impl std::fmt::Display) -> RagError {
    RagError::EmbeddingError(format!("Failed to load {what}: {e}"))
}

impl LocalEmbedding {
    /// Load the model and tokenizer from `model_dir`
    pub fn load(
        model_dir: &Path,
        model_name: impl Into<String>,
        max_length: usize,
    ) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        for path in [&model_path, &tokenizer_path] {
            if !path.is_file() {
                return Err(RagError::EmbeddingError(format!(
                    "Embedding model file not found: {}",
                    path.display()
                )));
            }
        }

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| load_error("tokenizer", e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| load_error("tokenizer", e))?;

        let model = tract_onnx::onnx()
            .model_for_path(&model_path)
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| load_error("ONNX model", e))?;

        let inner = LocalModel { model, tokenizer };

        // The hidden size is read off a probe run rather than trusted from config.
        let dimension = inner
            .embed(&["dimension probe".to_string()])?
            .first()
            .map(Vec::len)
            .ok_or_else(|| RagError::EmbeddingError("Model produced no output".to_string()))?;

        let model_name = model_name.into();
        tracing::info!(
            model = %model_name,
            dir = %model_dir.display(),
            dimension,
            "Loaded local embedding model"
        );

        Ok(Self {
            inner: Arc::new(inner),
            model_name,
            dimension,
        })
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::load(&config.model_dir, config.model.clone(), config.max_length)
    }
}

impl LocalModel {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| RagError::EmbeddingError(format!("Tokenization failed: {e}")))?;

        let batch = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        let mut type_ids = Vec::with_capacity(batch * seq_len);
        for enc in &encodings {
            ids.extend(enc.get_ids().iter().map(|&v| v as i64));
            mask.extend(enc.get_attention_mask().iter().map(|&v| v as i64));
            type_ids.extend(enc.get_type_ids().iter().map(|&v| v as i64));
        }

        let tensor = |data: &[i64]| {
            Tensor::from_shape(&[batch, seq_len], data)
                .map_err(|e| RagError::EmbeddingError(format!("Bad input shape: {e}")))
        };
        let outputs = self
            .model
            .run(tvec![
                tensor(&ids)?.into(),
                tensor(&mask)?.into(),
                tensor(&type_ids)?.into(),
            ])
            .map_err(|e| RagError::EmbeddingError(format!("Inference failed: {e}")))?;

        // (batch, seq_len, hidden)
        let hidden = outputs[0]
            .to_array_view::<f32>()
            .and_then(|view| Ok(view.into_dimensionality::<tract_ndarray::Ix3>()?))
            .map_err(|e| RagError::EmbeddingError(format!("Unexpected model output: {e}")))?;

        let hidden_size = hidden.shape()[2];
        let mut embeddings = Vec::with_capacity(batch);
        for b in 0..batch {
            let tokens: Vec<f32> = hidden.slice(tract_ndarray::s![b, .., ..]).iter().copied().collect();
            let mut vector = mean_pool(&tokens, &mask[b * seq_len..(b + 1) * seq_len], hidden_size);
            l2_normalize(&mut vector);
            embeddings.push(vector);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingClient for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingError("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed(&texts))
            .await
            .map_err(|e| RagError::EmbeddingError(format!("Embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Average token vectors (row-major `[seq_len, hidden]`) where `mask` is set
pub fn mean_pool(tokens: &[f32], mask: &[i64], hidden_size: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (row, &m) in tokens.chunks_exact(hidden_size).zip(mask) {
        if m == 0 {
            continue;
        }
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1.0;
    }

    if count > 0.0 {
        for v in &mut pooled {
            *v /= count;
        }
    }
    pooled
}

/// Scale `vector` to unit length; the zero vector is left unchanged
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
