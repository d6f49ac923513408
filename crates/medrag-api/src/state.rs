//! Application state management
//!
//! Author: hephaex@gmail.com

use medrag_core::config::AppConfig;
use medrag_rag::{create_llm_client, RagPipeline};
use medrag_vector::{create_embedding_client, EmbeddingClient, LocalIndex, VectorSearchBackend};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
///
/// Built once at startup and never mutated afterwards.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Retrieval pipeline, absent when no index could be loaded
    pipeline: Option<Arc<RagPipeline>>,
    /// Chunks in the loaded index
    indexed_chunks: usize,
}

impl AppState {
    /// Create state without a pipeline
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            pipeline: None,
            indexed_chunks: 0,
        }
    }

    /// Attach a pipeline backed by an index of `indexed_chunks` chunks
    pub fn with_pipeline(mut self, pipeline: Arc<RagPipeline>, indexed_chunks: usize) -> Self {
        self.pipeline = Some(pipeline);
        self.indexed_chunks = indexed_chunks;
        self
    }

    /// Load the index and build the pipeline from config
    ///
    /// A missing or unusable index is logged and leaves the pipeline unset;
    /// a misconfigured LLM client is an error.
    pub fn bootstrap(config: AppConfig) -> medrag_core::Result<Self> {
        let llm_client: Arc<dyn medrag_core::LlmClient> =
            Arc::from(create_llm_client(&config.llm)?);

        let index_dir = config.paths.index_dir.clone();
        if !LocalIndex::exists(&index_dir) {
            tracing::warn!(
                index_dir = %index_dir.display(),
                "Vector database not found. Run `medrag ingest` first."
            );
            return Ok(Self::new(config));
        }

        let loaded = create_embedding_client(&config.embedding).and_then(|embedder| {
            let embedder: Arc<dyn EmbeddingClient> = Arc::from(embedder);
            let index =
                LocalIndex::open_for(&index_dir, embedder.model_name(), embedder.dimension())?;
            Ok((embedder, index))
        });

        let (embedder, index) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(
                    index_dir = %index_dir.display(),
                    error = %e,
                    "Failed to load vector database; retrieval unavailable"
                );
                return Ok(Self::new(config));
            }
        };

        let indexed_chunks = index.len();
        tracing::info!(
            index_dir = %index_dir.display(),
            chunks = indexed_chunks,
            model = embedder.model_name(),
            "Vector database loaded"
        );

        let search = VectorSearchBackend::new(embedder, Arc::new(index));
        let pipeline =
            RagPipeline::new(llm_client, config.rag.top_k).with_search(Arc::new(search));

        Ok(Self::new(config).with_pipeline(Arc::new(pipeline), indexed_chunks))
    }

    /// Get the pipeline if an index is loaded
    pub fn pipeline(&self) -> Option<&Arc<RagPipeline>> {
        self.pipeline.as_ref()
    }

    pub fn index_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn indexed_chunks(&self) -> usize {
        self.indexed_chunks
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
