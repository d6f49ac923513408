//! MedRAG Core - Domain models, traits, and shared types
//!
//! This crate defines the abstractions shared by the ingestion and
//! query pipelines:
//! - Common error types
//! - Document chunk and search result models
//! - Chat message types for the inference API
//! - Shared traits for search backends and LLM clients
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LlmConfig, LlmProvider,
    LoggingConfig, PathsConfig, RagConfig, ServerConfig,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for MedRAG operations
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

// ============================================================================
// Document Models
// ============================================================================

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document path
    pub source: String,

    /// Page number (1-based)
    pub page: u32,

    /// Chunk index within the whole document
    pub chunk_index: u32,

    /// Starting character offset within the page
    pub start_offset: usize,

    /// Ending character offset within the page (exclusive)
    pub end_offset: usize,
}

/// A chunk of document content, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Text content
    pub content: String,

    /// Source metadata
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Create a new chunk
    pub fn new(content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Character length of the content
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

// ============================================================================
// Search and Chat Types
// ============================================================================

/// Search result from a similarity backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Chunk content
    pub content: String,

    /// Similarity score (higher is closer)
    pub score: f32,

    /// Source metadata
    pub metadata: ChunkMetadata,
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for search backends
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Search for the `limit` closest chunks, closest first
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat exchange and return the first completion's text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ChunkMetadata {
        ChunkMetadata {
            source: "data/Medical_book.pdf".to_string(),
            page: 3,
            chunk_index: 7,
            start_offset: 0,
            end_offset: 11,
        }
    }

    #[test]
    fn test_chunk_char_len_counts_scalars() {
        let chunk = DocumentChunk::new("état fébrile", metadata());
        assert_eq!(chunk.char_len(), 12);
    }

    #[test]
    fn test_chat_message_serializes_lowercase_role() {
        let msg = ChatMessage::system("be careful");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"], "be careful");

        let user = ChatMessage::user("What is hypertension?");
        assert_eq!(serde_json::to_value(&user).unwrap()["role"], "user");
    }

    #[test]
    fn test_error_messages() {
        let err = RagError::IndexError("missing index.json".to_string());
        assert_eq!(err.to_string(), "Index error: missing index.json");

        let err: RagError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
