//! Core data models used throughout the engine.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the ingestion and retrieval pipeline. Structured metadata
//! (e.g. [`RepoInfo`]) is kept structured here; the graph store flattens
//! it into scalar node properties at the storage boundary.

use serde::{Deserialize, Serialize};

/// Metadata for one ingested unit: an uploaded file or a cloned repository.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMeta {
    pub id: String,
    /// Display name (original filename, or repository name).
    pub filename: String,
    /// Ingestion timestamp, epoch seconds.
    pub uploaded_at: i64,
    /// Total byte size of the ingested content.
    pub file_size: i64,
    /// Number of chunks currently linked to this document. Set to zero
    /// at creation and updated once ingestion commits.
    pub chunk_count: i64,
    /// Present only for repository sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoInfo>,
}

/// Repository-specific document metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RepoInfo {
    pub url: String,
    pub name: String,
    pub file_count: i64,
}

/// A chunk of extracted text with its embedding, ready for storage.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic id: `{document_id}_chunk_{index}`.
    pub id: String,
    pub document_id: String,
    /// Ordinal position within the document (global across files for
    /// repository sources).
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Present for chunks derived from repository files.
    pub code: Option<CodeRef>,
}

/// Source-file attribution for a code chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRef {
    pub file_path: String,
    pub language: String,
    /// Ordinal position within the source file.
    pub file_chunk_index: i64,
}

/// A chunk as returned from the store (embedding omitted).
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub chunk_index: i64,
    pub content: String,
    pub length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A similarity-search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    /// Display name of the owning document.
    pub filename: String,
    pub content: String,
    pub chunk_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

/// One turn of conversation history passed through to generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Source attribution attached to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub document_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub score: f64,
}

/// The result of a retrieval-augmented answer.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Summary returned to callers after a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub id: String,
    pub filename: String,
    pub size: i64,
    pub uploaded_at: i64,
    pub chunks_created: i64,
    /// Repository ingestion only: number of files that produced chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<i64>,
}
