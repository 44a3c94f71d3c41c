//! Graph storage abstraction.
//!
//! The [`GraphStore`] trait is the seam between the ingestion/retrieval
//! pipeline and the backing graph database. [`Neo4jStore`] is the
//! production implementation; [`MemoryStore`] backs tests and local
//! experimentation without a running database.
//!
//! # Graph shape
//!
//! Documents and chunks are nodes. Every chunk has a `BELONGS_TO` edge
//! to its document, and consecutive chunks from the same source file are
//! linked with `NEXT` edges. Sequence chains never cross file
//! boundaries within a repository document.

mod memory;
mod neo4j;

pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::{Chunk, DocumentMeta, SearchHit, StoredChunk};

/// Persistent graph of documents, chunks, and their relationships.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a document node. `chunk_count` should be zero; it is
    /// updated via [`GraphStore::set_chunk_count`] once chunks commit.
    async fn create_document(&self, doc: &DocumentMeta) -> Result<()>;

    /// Update a document's chunk count after its chunks are stored.
    async fn set_chunk_count(&self, document_id: &str, count: i64) -> Result<()>;

    /// Store a batch of chunks for one document, creating `BELONGS_TO`
    /// edges and `NEXT` edges between consecutive chunks of the same
    /// source file.
    async fn create_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// Return the `top_k` chunks most similar to `query`, ranked by
    /// cosine similarity descending with ties broken by insertion order.
    async fn vector_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;

    /// List all documents, most recently uploaded first.
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>>;

    /// Delete a document and all of its chunks. Fails with not-found if
    /// the id does not exist.
    async fn delete_document(&self, document_id: &str) -> Result<()>;

    /// Return a document's chunks ordered by chunk index, embeddings
    /// omitted. Fails with not-found if the id does not exist.
    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>>;
}

/// A chunk considered for ranking: its search hit (score unset), its
/// stored embedding, and its global insertion sequence.
pub(crate) struct RankCandidate {
    pub seq: i64,
    pub embedding: Vec<f32>,
    pub hit: SearchHit,
}

/// Rank candidates by cosine similarity to `query`, descending, with
/// ties broken by insertion sequence ascending. Both the in-memory
/// store and the database fallback path use this so their orderings
/// agree exactly.
pub(crate) fn rank_by_cosine(
    query: &[f32],
    candidates: Vec<RankCandidate>,
    top_k: usize,
) -> Vec<SearchHit> {
    let mut scored: Vec<(f64, i64, SearchHit)> = candidates
        .into_iter()
        .map(|c| {
            let score = cosine_similarity(query, &c.embedding) as f64;
            (score, c.seq, c.hit)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(score, _, mut hit)| {
            hit.score = score;
            hit
        })
        .collect()
}
