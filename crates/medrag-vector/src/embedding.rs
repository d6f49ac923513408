//! Embedding client for generating vector representations
//!
//! Supports a local ONNX sentence-transformer (see [`crate::local`]) and
//! the Ollama embedding API.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use medrag_core::{EmbeddingConfig, EmbeddingProvider, RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::local::LocalEmbedding;

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
///
/// Ingestion and query must use the same implementation and model; the
/// model name and dimension are recorded in the index manifest and
/// checked when the index is opened.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Model identifier recorded in the index manifest
    fn model_name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" | "all-minilm:l6-v2" => 384,
            _ => 768,
        };

        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            dimension,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.ollama_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingError(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingError(format!(
                "Ollama embedding error ({status}): {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        if result.embedding.len() != self.dimension {
            return Err(RagError::EmbeddingError(format!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                result.embedding.len(),
                self.dimension
            )));
        }

        Ok(result.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // No batch endpoint; one request per text
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
///
/// The local provider loads the ONNX model eagerly, so this fails fast when
/// the model files are missing.
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::Local => Ok(Box::new(LocalEmbedding::from_config(config)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn spawn_fake_ollama(dimension: usize) -> String {
        let app = Router::new().route(
            "/api/embeddings",
            post(move |Json(body): Json<Value>| async move {
                let prompt = body["prompt"].as_str().unwrap_or_default();
                let mut embedding = vec![0.0f32; dimension];
                embedding[0] = prompt.len() as f32;
                Json(json!({ "embedding": embedding }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_ollama_dimension() {
        let client = OllamaEmbedding::new("http://localhost:11434", "nomic-embed-text");
        assert_eq!(client.dimension(), 768);

        let client = OllamaEmbedding::new("http://localhost:11434/", "all-minilm");
        assert_eq!(client.dimension(), 384);
        assert_eq!(client.model_name(), "all-minilm");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_ollama_embed_batch_keeps_order() {
        let url = spawn_fake_ollama(384).await;
        let client = OllamaEmbedding::new(url, "all-minilm");

        let texts = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        let vectors = client.embed_batch(&texts).await.unwrap();

        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_ollama_dimension_mismatch() {
        let url = spawn_fake_ollama(16).await;
        let client = OllamaEmbedding::new(url, "all-minilm");

        let err = client.embed("fever").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError(_)));
    }

    #[test]
    fn test_local_provider_requires_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model_dir: dir.path().to_path_buf(),
            ..EmbeddingConfig::default()
        };

        let err = create_embedding_client(&config).err().unwrap();
        assert!(matches!(err, RagError::EmbeddingError(_)));
    }
}
