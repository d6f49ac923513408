//! MedRAG Parser - Document loading and splitting
//!
//! Supports loading of:
//! - PDF documents
//! - Markdown files
//! - Plain text files
//!
//! Each loader implements the `DocumentLoader` trait and produces a
//! `LoadedDocument`: an ordered list of page-level text blocks. The
//! `TextSplitter` turns those blocks into overlapping chunks ready for
//! embedding.

use std::path::Path;
use thiserror::Error;

pub mod pdf;
pub mod splitter;

pub use pdf::PdfLoader;
pub use splitter::{Span, TextSplitter};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading a document
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Source file does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// Text is not valid UTF-8
    #[error("Text encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

impl From<ParserError> for medrag_core::RagError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::NotFound(path) => medrag_core::RagError::NotFound(path),
            other => medrag_core::RagError::ParseError(other.to_string()),
        }
    }
}

// ============================================================================
// Loaded Document Types
// ============================================================================

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlock {
    /// Page number (1-based)
    pub page: u32,

    /// Extracted text
    pub text: String,
}

/// A loaded document split into page-level blocks
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Original file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Non-empty pages in source order
    pub pages: Vec<PageBlock>,
}

impl LoadedDocument {
    /// Build a document from per-page text. Pages are numbered by
    /// position; blank ones are dropped without renumbering the rest.
    pub fn from_pages<I, S>(file_path: impl Into<String>, file_type: FileType, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .map(Into::<String>::into)
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| PageBlock {
                page: i as u32 + 1,
                text,
            })
            .collect();

        Self {
            file_path: file_path.into(),
            file_type,
            pages,
        }
    }

    /// Build a document from raw text, one page per form feed
    pub fn from_text(file_path: impl Into<String>, file_type: FileType, text: &str) -> Self {
        Self::from_pages(file_path, file_type, text.split('\x0C'))
    }
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Loader Trait
// ============================================================================

/// Trait for document loaders
pub trait DocumentLoader: Send + Sync {
    /// Load a document from a file path
    fn load(&self, path: &Path) -> Result<LoadedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this loader can handle a file type
    fn can_load(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

/// Plain text and markdown loader
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let bytes = read_file(path)?;
        let text =
            String::from_utf8(bytes).map_err(|e| ParserError::EncodingError(e.to_string()))?;

        Ok(LoadedDocument::from_text(
            path.display().to_string(),
            FileType::from_path(path),
            &text,
        ))
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

/// Load a document with the loader matching its extension
pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(ParserError::NotFound(path.display().to_string()));
    }

    let file_type = FileType::from_path(path);
    let loaders: [&dyn DocumentLoader; 2] = [&PdfLoader, &PlainTextLoader];

    let loader = loaders
        .into_iter()
        .find(|l| l.can_load(file_type))
        .ok_or_else(|| {
            ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            )
        })?;

    let doc = loader.load(path)?;
    tracing::debug!(
        path = %path.display(),
        file_type = %doc.file_type,
        pages = doc.pages.len(),
        "Document loaded"
    );
    Ok(doc)
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ParserError::NotFound(path.display().to_string()),
        _ => ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        },
    })
}

// ============================================================================
// Tests
// ============================================================================
