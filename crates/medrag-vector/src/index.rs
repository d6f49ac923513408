//! Directory-backed vector index
//!
//! The index is a single JSON document, `index.json`, inside the index
//! directory: a manifest describing the embedder that produced it plus
//! every chunk with its vector. Ingestion always writes a fresh index to a
//! temporary file and renames it into place, so readers never see a
//! partially written index and re-running ingestion never duplicates
//! chunks.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medrag_core::{ChunkMetadata, DocumentChunk, RagError, Result, SearchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::VectorStore;

/// File name of the index inside the index directory
pub const INDEX_FILE: &str = "index.json";

const TMP_FILE: &str = "index.json.tmp";
const FORMAT_VERSION: u32 = 1;

/// Describes how an index was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,

    /// Embedding model that produced the vectors
    pub embedding_model: String,

    /// Vector dimension
    pub dimension: usize,

    pub created_at: DateTime<Utc>,

    /// Source document the index was built from
    pub source: Option<String>,
}

/// A stored chunk and its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: Uuid,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    #[serde(flatten)]
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

/// In-memory vector index with brute-force cosine search
#[derive(Debug, Clone)]
pub struct LocalIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl LocalIndex {
    /// Create an empty index for vectors from `embedding_model`
    pub fn new(embedding_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                embedding_model: embedding_model.into(),
                dimension,
                created_at: Utc::now(),
                source: None,
            },
            entries: Vec::new(),
        }
    }

    /// Record the source document in the manifest
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.manifest.source = Some(source.into());
        self
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a chunk with its embedding
    pub fn insert(&mut self, chunk: DocumentChunk, vector: Vec<f32>) -> Result<Uuid> {
        if vector.len() != self.manifest.dimension {
            return Err(RagError::IndexError(format!(
                "Vector has {} dimensions, index expects {}",
                vector.len(),
                self.manifest.dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::IndexError(format!(
                "Non-finite embedding for chunk {}",
                chunk.metadata.chunk_index
            )));
        }

        let id = Uuid::new_v4();
        self.entries.push(IndexEntry {
            id,
            content: chunk.content,
            metadata: chunk.metadata,
            vector,
        });
        Ok(id)
    }

    /// Path of the index file inside `dir`
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Whether `dir` holds a persisted index
    pub fn exists(dir: &Path) -> bool {
        Self::file_path(dir).is_file()
    }

    /// Write the index into `dir`, replacing any previous index
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let file = IndexFile {
            manifest: self.manifest.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec(&file)
            .map_err(|e| RagError::IndexError(format!("Failed to serialize index: {e}")))?;

        let tmp_path = dir.join(TMP_FILE);
        let final_path = Self::file_path(dir);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &final_path)?;

        tracing::info!(
            path = %final_path.display(),
            chunks = self.entries.len(),
            dimension = self.manifest.dimension,
            "Index persisted"
        );
        Ok(final_path)
    }

    /// Load a persisted index from `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);
        if !path.is_file() {
            return Err(RagError::NotFound(format!(
                "No index at {}",
                path.display()
            )));
        }

        let bytes = std::fs::read(&path)?;
        let file: IndexFile = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::IndexError(format!("Corrupt index {}: {e}", path.display()))
        })?;

        if file.manifest.format_version != FORMAT_VERSION {
            return Err(RagError::IndexError(format!(
                "Unsupported index format version {}",
                file.manifest.format_version
            )));
        }
        if let Some(entry) = file
            .entries
            .iter()
            .find(|e| e.vector.len() != file.manifest.dimension)
        {
            return Err(RagError::IndexError(format!(
                "Entry {} has {} dimensions, manifest says {}",
                entry.id,
                entry.vector.len(),
                file.manifest.dimension
            )));
        }

        Ok(Self {
            manifest: file.manifest,
            entries: file.entries,
        })
    }

    /// Load a persisted index and check it was built by the given embedder
    pub fn open_for(dir: &Path, embedding_model: &str, dimension: usize) -> Result<Self> {
        let index = Self::open(dir)?;
        let manifest = index.manifest();

        if manifest.embedding_model != embedding_model || manifest.dimension != dimension {
            return Err(RagError::IndexError(format!(
                "Index was built with {} ({} dims) but the configured embedder is {} ({} dims); re-run ingestion",
                manifest.embedding_model, manifest.dimension, embedding_model, dimension
            )));
        }
        Ok(index)
    }

    /// Top `k` entries by cosine similarity to `query`
    ///
    /// Equal scores keep insertion order.
    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.manifest.dimension {
            return Err(RagError::SearchError(format!(
                "Query has {} dimensions, index has {}",
                query.len(),
                self.manifest.dimension
            )));
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.vector), entry))
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| SearchResult {
                content: entry.content.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl VectorStore for LocalIndex {
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_vector(query_vector, limit)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cosine similarity; 0.0 when either vector has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, page: u32, index: u32) -> DocumentChunk {
        DocumentChunk::new(
            content,
            ChunkMetadata {
                source: "data/Medical_book.pdf".to_string(),
                page,
                chunk_index: index,
                start_offset: 0,
                end_offset: content.chars().count(),
            },
        )
    }

    fn sample_index() -> LocalIndex {
        let mut index = LocalIndex::new("test-model", 3).with_source("data/Medical_book.pdf");
        index
            .insert(chunk("Aspirin reduces fever.", 1, 0), vec![1.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(chunk("Insulin lowers blood sugar.", 2, 1), vec![0.0, 1.0, 0.0])
            .unwrap();
        index
            .insert(chunk("Ibuprofen reduces fever.", 3, 2), vec![1.0, 0.0, 0.0])
            .unwrap();
        index
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity_and_keeps_ties_stable() {
        let index = sample_index();
        let results = index.search_vector(&[0.9, 0.1, 0.0], 3).unwrap();

        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Aspirin reduces fever.",
                "Ibuprofen reduces fever.",
                "Insulin lowers blood sugar."
            ]
        );
        assert!(results[0].score >= results[2].score);
    }

    #[test]
    fn test_search_limits_results() {
        let index = sample_index();
        assert_eq!(index.search_vector(&[0.0, 1.0, 0.0], 1).unwrap().len(), 1);
        assert_eq!(index.search_vector(&[0.0, 1.0, 0.0], 10).unwrap().len(), 3);
        assert!(LocalIndex::new("m", 3)
            .search_vector(&[1.0, 0.0, 0.0], 3)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dimension_checks() {
        let mut index = LocalIndex::new("test-model", 3);
        assert!(matches!(
            index.insert(chunk("x", 1, 0), vec![1.0, 2.0]),
            Err(RagError::IndexError(_))
        ));
        assert!(matches!(
            index.insert(chunk("x", 1, 0), vec![1.0, f32::NAN, 0.0]),
            Err(RagError::IndexError(_))
        ));
        assert!(matches!(
            index.search_vector(&[1.0], 1),
            Err(RagError::SearchError(_))
        ));
    }

    #[test]
    fn test_persist_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("vector_db");
        assert!(!LocalIndex::exists(&index_dir));

        let path = sample_index().persist(&index_dir).unwrap();
        assert_eq!(path, index_dir.join(INDEX_FILE));
        assert!(LocalIndex::exists(&index_dir));
        assert!(!index_dir.join(TMP_FILE).exists());

        let loaded = LocalIndex::open(&index_dir).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.manifest().embedding_model, "test-model");
        assert_eq!(
            loaded.manifest().source.as_deref(),
            Some("data/Medical_book.pdf")
        );
        assert_eq!(loaded.entries()[1].metadata.page, 2);
    }

    #[test]
    fn test_persist_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().persist(dir.path()).unwrap();

        let mut smaller = LocalIndex::new("test-model", 3);
        smaller
            .insert(chunk("Only chunk.", 1, 0), vec![0.0, 0.0, 1.0])
            .unwrap();
        smaller.persist(dir.path()).unwrap();

        assert_eq!(LocalIndex::open(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_open_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalIndex::open(dir.path()),
            Err(RagError::NotFound(_))
        ));

        std::fs::write(dir.path().join(INDEX_FILE), b"{ not json").unwrap();
        assert!(matches!(
            LocalIndex::open(dir.path()),
            Err(RagError::IndexError(_))
        ));
    }

    #[test]
    fn test_open_for_rejects_other_embedder() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().persist(dir.path()).unwrap();

        assert!(LocalIndex::open_for(dir.path(), "test-model", 3).is_ok());
        assert!(matches!(
            LocalIndex::open_for(dir.path(), "other-model", 3),
            Err(RagError::IndexError(_))
        ));
        assert!(matches!(
            LocalIndex::open_for(dir.path(), "test-model", 384),
            Err(RagError::IndexError(_))
        ));
    }
}
