//! MedRAG Vector - Embeddings and vector search
//!
//! Provides the embedding clients used by both pipelines, the
//! directory-backed index written by ingestion and read by the query
//! service, and a `SearchBackend` that ties the two together.

use async_trait::async_trait;
use medrag_core::{Result, SearchBackend, SearchResult};
use std::sync::Arc;

pub mod embedding;
pub mod index;
pub mod local;

pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding};
pub use index::{IndexEntry, IndexManifest, LocalIndex, INDEX_FILE};
pub use local::LocalEmbedding;

/// Trait for read-only vector search
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search for the `limit` most similar vectors, closest first
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored vectors
    fn len(&self) -> usize;

    /// Whether the store holds no vectors
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Semantic search: embed the query, then search the vector store
pub struct VectorSearchBackend {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl VectorSearchBackend {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Number of indexed chunks
    pub fn indexed_chunks(&self) -> usize {
        self.store.len()
    }
}

#[async_trait]
impl SearchBackend for VectorSearchBackend {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed(query).await?;
        let results = self.store.search(&query_vector, limit).await?;
        tracing::debug!(
            hits = results.len(),
            top_score = results.first().map(|r| r.score),
            "Vector search completed"
        );
        Ok(results)
    }

    fn name(&self) -> &str {
        "vector"
    }
}
