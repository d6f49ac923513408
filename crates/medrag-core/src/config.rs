//! MedRAG Configuration Management
//!
//! Handles configuration from environment variables (including a `.env`
//! file) and an optional TOML file, with defaults that match a local
//! development checkout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "MEDRAG_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Fixed on-disk locations
    pub paths: PathsConfig,

    /// Embedding model configuration
    pub embedding: EmbeddingConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// RAG pipeline configuration
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file named by
    /// `MEDRAG_CONFIG` (if any), then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // `.env` may itself set MEDRAG_CONFIG.
        let _ = dotenvy::dotenv();
        Self::load_from(std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
    }

    /// Like [`AppConfig::load`], with the TOML file given explicitly
    pub fn load_from(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // A missing .env is the normal case outside development.
        let _ = dotenvy::dotenv();

        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", &port)?;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = origin.trim().to_string();
        }

        // Paths
        if let Some(path) = lookup("SOURCE_DOCUMENT") {
            self.paths.source_document = PathBuf::from(path);
        }
        if let Some(path) = lookup("INDEX_DIR") {
            self.paths.index_dir = PathBuf::from(path);
        }

        // Embedding
        if let Some(provider) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dir) = lookup("EMBEDDING_MODEL_DIR") {
            self.embedding.model_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.ollama_url = url.clone();
            self.llm.ollama_url = url;
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(key) = lookup("OPENROUTER_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(reasoning) = lookup("LLM_REASONING") {
            self.llm.reasoning = parse_bool("LLM_REASONING", &reasoning)?;
        }

        // RAG
        if let Some(k) = lookup("RAG_TOP_K") {
            self.rag.top_k = parse_value("RAG_TOP_K", &k)?;
        }
        if let Some(size) = lookup("CHUNK_SIZE") {
            self.rag.chunk_size = parse_value("CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            self.rag.chunk_overlap = parse_value("CHUNK_OVERLAP", &overlap)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_bool("LOG_JSON", &json)?;
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// The single origin allowed by CORS
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Fixed on-disk paths shared by the ingestor and the query service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Document to ingest
    pub source_document: PathBuf,

    /// Directory holding the persisted vector index
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_document: PathBuf::from("data/Medical_book.pdf"),
            index_dir: PathBuf::from("vector_db"),
        }
    }
}

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// ONNX model run in-process
    Local,
    /// Ollama embeddings endpoint
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "onnx" => Ok(Self::Local),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embedding model configuration
///
/// Ingestion and serving must agree on every field here; the index
/// manifest records `model` and the produced dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Model name recorded in the index manifest
    pub model: String,

    /// Directory with `model.onnx` and `tokenizer.json` (local provider)
    pub model_dir: PathBuf,

    /// Maximum tokens per input; longer inputs are truncated
    pub max_length: usize,

    /// Texts per embedding batch during ingestion
    pub batch_size: usize,

    /// Ollama server URL (ollama provider)
    pub ollama_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            max_length: 256,
            batch_size: 32,
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions API (OpenRouter by default)
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openrouter" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// API key for the OpenAI-compatible endpoint
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Ollama server URL
    pub ollama_url: String,

    /// Remote model identifier
    pub model: String,

    /// Ask the provider to enable reasoning
    pub reasoning: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            model: "nvidia/nemotron-3-nano-30b-a3b:free".to_string(),
            reasoning: true,
        }
    }
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
