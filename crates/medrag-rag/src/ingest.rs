//! Document ingestion: load, split, embed, persist
//!
//! Every run builds a fresh index and swaps it in atomically, so a failed
//! run leaves the previous index untouched.

use medrag_core::{RagError, Result};
use medrag_parser::{load_document, TextSplitter};
use medrag_vector::{EmbeddingClient, LocalIndex};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Summary of an ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Pages with extractable text
    pub pages: usize,

    /// Chunks embedded and stored
    pub chunks: usize,

    /// Embedding dimension
    pub dimension: usize,

    /// Location of the written index file
    pub index_path: PathBuf,

    pub elapsed_ms: u64,
}

/// Builds a persisted index from a source document
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingClient>,
    splitter: TextSplitter,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, splitter: TextSplitter, batch_size: usize) -> Self {
        Self {
            embedder,
            splitter,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest `source` into a fresh index under `index_dir`
    pub async fn ingest(&self, source: &Path, index_dir: &Path) -> Result<IngestReport> {
        let start = Instant::now();

        if !source.is_file() {
            return Err(RagError::NotFound(format!(
                "Source document not found: {}",
                source.display()
            )));
        }

        tracing::info!(source = %source.display(), "Loading document");
        let doc = load_document(source)?;

        let chunks = self.splitter.split_document(&doc);
        if chunks.is_empty() {
            return Err(RagError::ParseError(format!(
                "No text could be extracted from {}",
                source.display()
            )));
        }
        tracing::info!(
            pages = doc.pages.len(),
            chunks = chunks.len(),
            chunk_size = self.splitter.chunk_size(),
            chunk_overlap = self.splitter.chunk_overlap(),
            "Document split"
        );

        let dimension = self.embedder.dimension();
        let mut index = LocalIndex::new(self.embedder.model_name(), dimension)
            .with_source(source.display().to_string());

        let total = chunks.len();
        let mut pending = chunks.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<_> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingError(format!(
                    "Embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (chunk, vector) in batch.into_iter().zip(vectors) {
                index.insert(chunk, vector)?;
            }
            tracing::debug!(embedded = index.len(), total, "Embedding progress");
        }

        let index_path = index.persist(index_dir)?;

        let report = IngestReport {
            pages: doc.pages.len(),
            chunks: index.len(),
            dimension,
            index_path,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            chunks = report.chunks,
            elapsed_ms = report.elapsed_ms,
            "Ingestion complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CannedLlm, HashingEmbedding, DIM};
    use crate::RagPipeline;
    use medrag_vector::{VectorSearchBackend, INDEX_FILE};
    use std::io::Write;

    fn source_file(dir: &Path) -> PathBuf {
        let path = dir.join("Medical_book.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        for i in 0..30 {
            writeln!(
                file,
                "Section {i}. Hypertension is persistently raised arterial blood pressure. \
                 Treatment includes lifestyle change and antihypertensive drugs."
            )
            .unwrap();
        }
        write!(file, "\x0CAnemia is a deficiency of red blood cells or hemoglobin.").unwrap();
        path
    }

    fn ingestor(batch_size: usize) -> Ingestor {
        Ingestor::new(
            Arc::new(HashingEmbedding),
            TextSplitter::new(300, 60).unwrap(),
            batch_size,
        )
    }

    #[tokio::test]
    async fn test_ingest_builds_index() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let index_dir = dir.path().join("vector_db");

        let report = ingestor(4).ingest(&source, &index_dir).await.unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.dimension, DIM);
        assert_eq!(report.index_path, index_dir.join(INDEX_FILE));
        assert!(report.chunks > 4);

        let index = LocalIndex::open_for(&index_dir, "hashing-test", DIM).unwrap();
        assert_eq!(index.len(), report.chunks);

        let last = index.entries().last().unwrap();
        assert_eq!(last.metadata.page, 2);

        let hits = index
            .search_vector(&HashingEmbedding::vector("anemia hemoglobin"), 1)
            .unwrap();
        assert!(hits[0].content.contains("Anemia"));
    }

    #[tokio::test]
    async fn test_reingest_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let index_dir = dir.path().join("vector_db");

        let first = ingestor(32).ingest(&source, &index_dir).await.unwrap();
        let second = ingestor(3).ingest(&source, &index_dir).await.unwrap();

        assert_eq!(first.chunks, second.chunks);

        let index = LocalIndex::open_for(&index_dir, "hashing-test", DIM).unwrap();
        assert_eq!(index.len(), first.chunks);

        let search = VectorSearchBackend::new(Arc::new(HashingEmbedding), Arc::new(index));
        let pipeline = RagPipeline::new(Arc::new(CannedLlm::new("ok")), 3)
            .with_search(Arc::new(search));
        let context = pipeline
            .get_relevant_context("anemia hemoglobin", 3)
            .await
            .unwrap();
        assert!(!context.is_empty());
        assert!(context.contains("Anemia"));
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ingestor(32)
            .ingest(&dir.path().join("missing.pdf"), &dir.path().join("vector_db"))
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::NotFound(_)));
        assert!(!LocalIndex::exists(&dir.path().join("vector_db")));
    }

    #[tokio::test]
    async fn test_empty_source_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("vector_db");
        let first = ingestor(32)
            .ingest(&source_file(dir.path()), &index_dir)
            .await
            .unwrap();

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "   \n").unwrap();
        let err = ingestor(32).ingest(&empty, &index_dir).await.unwrap_err();

        assert!(matches!(err, RagError::ParseError(_)));
        assert_eq!(LocalIndex::open(&index_dir).unwrap().len(), first.chunks);
    }
}
