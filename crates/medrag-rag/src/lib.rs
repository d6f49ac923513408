//! MedRAG RAG - Retrieval-augmented answering
//!
//! `RagPipeline` retrieves the chunks closest to a question from the
//! vector index and asks a remote chat model to answer using them as
//! context. The `ingest` module builds the index the pipeline reads.
//!
//! Author: hephaex@gmail.com

use medrag_core::{ChatMessage, LlmClient, RagError, Result, SearchBackend};
use std::sync::Arc;
use std::time::Instant;

pub mod ingest;
pub mod llm;

pub use ingest::{IngestReport, Ingestor};
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};

/// Instruction given to the model ahead of the retrieved context
pub const SYSTEM_PROMPT: &str = "You are a helpful medical assistant. Use the following \
retrieved medical context to answer the user's question accurately. If the answer is not \
found in the context, say you don't know. Do not make up medical information.";

/// Separator placed between retrieved chunks
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// System message carrying the retrieved context
pub fn build_system_prompt(context: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\nContext:\n{context}")
}

// ============================================================================
// Pipeline
// ============================================================================

/// Retrieve-then-generate pipeline
pub struct RagPipeline {
    /// Similarity search over the index, absent when no index is loaded
    search: Option<Arc<dyn SearchBackend>>,

    /// Remote chat model
    llm_client: Arc<dyn LlmClient>,

    /// Chunks retrieved per question
    top_k: usize,
}

impl RagPipeline {
    /// Create a pipeline without an index
    pub fn new(llm_client: Arc<dyn LlmClient>, top_k: usize) -> Self {
        Self {
            search: None,
            llm_client,
            top_k,
        }
    }

    /// Attach the search backend
    pub fn with_search(mut self, search: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(search);
        self
    }

    /// Whether an index is available for retrieval
    pub fn has_index(&self) -> bool {
        self.search.is_some()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the `k` chunks closest to `question`, joined by blank lines
    ///
    /// Returns an empty string when no index is loaded.
    pub async fn get_relevant_context(&self, question: &str, k: usize) -> Result<String> {
        if k == 0 {
            return Err(RagError::ValidationError(
                "k must be at least 1".to_string(),
            ));
        }
        validate_question(question)?;

        let Some(search) = &self.search else {
            tracing::debug!("No index loaded, returning empty context");
            return Ok(String::new());
        };

        let results = search.search(question, k).await?;
        tracing::debug!(
            backend = search.name(),
            chunks = results.len(),
            "Context retrieved"
        );

        Ok(results
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }

    /// Ask the chat model to answer `question` from `context`
    pub async fn chat_with_model(&self, question: &str, context: &str) -> Result<String> {
        validate_question(question)?;

        let messages = [
            ChatMessage::system(build_system_prompt(context)),
            ChatMessage::user(question),
        ];

        tracing::info!(
            model = self.llm_client.model(),
            context_chars = context.chars().count(),
            "Calling chat model"
        );
        let answer = self.llm_client.chat(&messages).await?;
        tracing::info!(answer_chars = answer.chars().count(), "Chat model responded");

        Ok(answer)
    }

    /// Retrieve context with the configured `top_k` and generate an answer
    pub async fn answer(&self, question: &str) -> Result<String> {
        let start = Instant::now();

        let context = self.get_relevant_context(question, self.top_k).await?;
        let answer = self.chat_with_model(question, &context).await?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Question answered"
        );
        Ok(answer)
    }
}

fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(RagError::ValidationError(
            "question must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Test doubles
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
