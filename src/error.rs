//! Typed error taxonomy for the retrieval pipeline.
//!
//! Every fallible core operation returns [`RagError`] so that callers
//! (CLI, HTTP server, tool dispatch) can map failures to exit codes or
//! status codes without string matching.

use thiserror::Error;

/// Errors produced by the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration (bad chunk size/overlap, missing settings).
    /// Fatal at startup; never recovered silently.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding backend unreachable or returned an error. Ingestion
    /// aborts the whole batch; queries abort and surface to the caller.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Graph database unreachable or a query failed.
    #[error("graph database unavailable: {0}")]
    StorageUnavailable(String),

    /// Referenced document or chunk id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Ingestion input cannot be processed (unknown file type,
    /// unreadable archive, empty repository).
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Repository clone failed; nothing was written.
    #[error("repository clone failed: {0}")]
    CloneFailed(String),

    /// The generation backend failed. Never disguised as an answer.
    #[error("generation backend unavailable: {0}")]
    GenerationUnavailable(String),
}

impl RagError {
    /// Machine-readable error code used by the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Config(_) => "configuration_error",
            RagError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RagError::StorageUnavailable(_) => "storage_unavailable",
            RagError::NotFound(_) => "not_found",
            RagError::UnsupportedFormat(_) => "unsupported_format",
            RagError::CloneFailed(_) => "clone_failed",
            RagError::GenerationUnavailable(_) => "generation_unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
