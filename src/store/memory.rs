//! In-memory [`GraphStore`] used by tests and local experimentation.
//!
//! Mirrors the database-backed store's semantics exactly: same edge
//! rules, same ranking, same error cases. Nothing here persists.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{RagError, Result};
use crate::models::{Chunk, DocumentMeta, SearchHit, StoredChunk};

use super::{rank_by_cosine, GraphStore, RankCandidate};

struct ChunkRecord {
    chunk: Chunk,
    /// Global insertion sequence, used as the ranking tie-breaker.
    seq: i64,
}

#[derive(Default)]
struct Inner {
    docs: Vec<DocumentMeta>,
    chunks: Vec<ChunkRecord>,
    /// `NEXT` edges as (from chunk id, to chunk id).
    next_edges: Vec<(String, String)>,
    seq: i64,
}

/// Non-persistent graph store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the `NEXT` edges, for asserting sequence-chain shape.
    pub fn next_edges(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().next_edges.clone()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn create_document(&self, doc: &DocumentMeta) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.docs.iter().any(|d| d.id == doc.id) {
            return Err(RagError::StorageUnavailable(format!(
                "document {} already exists",
                doc.id
            )));
        }
        inner.docs.push(doc.clone());
        Ok(())
    }

    async fn set_chunk_count(&self, document_id: &str, count: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let doc = inner
            .docs
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| RagError::NotFound(format!("document {}", document_id)))?;
        doc.chunk_count = count;
        Ok(())
    }

    async fn create_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.docs.iter().any(|d| d.id == document_id) {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }

        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            // Chain consecutive chunks only within the same source file.
            let same_file = match (&a.code, &b.code) {
                (None, None) => true,
                (Some(ca), Some(cb)) => ca.file_path == cb.file_path,
                _ => false,
            };
            if same_file {
                inner.next_edges.push((a.id.clone(), b.id.clone()));
            }
        }

        for chunk in chunks {
            let seq = inner.seq;
            inner.seq += 1;
            inner.chunks.push(ChunkRecord {
                chunk: chunk.clone(),
                seq,
            });
        }
        Ok(())
    }

    async fn vector_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.lock().unwrap();
        let candidates = inner
            .chunks
            .iter()
            .map(|record| {
                let chunk = &record.chunk;
                let filename = inner
                    .docs
                    .iter()
                    .find(|d| d.id == chunk.document_id)
                    .map(|d| d.filename.clone())
                    .unwrap_or_default();
                RankCandidate {
                    seq: record.seq,
                    embedding: chunk.embedding.clone(),
                    hit: SearchHit {
                        chunk_id: chunk.id.clone(),
                        document_id: chunk.document_id.clone(),
                        filename,
                        content: chunk.content.clone(),
                        chunk_index: chunk.chunk_index,
                        file_path: chunk.code.as_ref().map(|c| c.file_path.clone()),
                        language: chunk.code.as_ref().map(|c| c.language.clone()),
                        score: 0.0,
                    },
                }
            })
            .collect();
        Ok(rank_by_cosine(query, candidates, top_k))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        let inner = self.inner.lock().unwrap();
        let mut docs = inner.docs.clone();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(docs)
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.docs.len();
        inner.docs.retain(|d| d.id != document_id);
        if inner.docs.len() == before {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }

        let removed: Vec<String> = inner
            .chunks
            .iter()
            .filter(|r| r.chunk.document_id == document_id)
            .map(|r| r.chunk.id.clone())
            .collect();
        inner.chunks.retain(|r| r.chunk.document_id != document_id);
        inner
            .next_edges
            .retain(|(from, to)| !removed.contains(from) && !removed.contains(to));
        Ok(())
    }

    async fn get_document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>> {
        let inner = self.inner.lock().unwrap();
        if !inner.docs.iter().any(|d| d.id == document_id) {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }

        let mut chunks: Vec<StoredChunk> = inner
            .chunks
            .iter()
            .filter(|r| r.chunk.document_id == document_id)
            .map(|r| StoredChunk {
                id: r.chunk.id.clone(),
                chunk_index: r.chunk.chunk_index,
                content: r.chunk.content.clone(),
                length: r.chunk.content.chars().count() as i64,
                file_path: r.chunk.code.as_ref().map(|c| c.file_path.clone()),
                language: r.chunk.code.as_ref().map(|c| c.language.clone()),
            })
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CodeRef;

    fn doc(id: &str, uploaded_at: i64) -> DocumentMeta {
        DocumentMeta {
            id: id.to_string(),
            filename: format!("{}.txt", id),
            uploaded_at,
            file_size: 10,
            chunk_count: 0,
            repo: None,
        }
    }

    fn chunk(doc_id: &str, index: i64, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: format!("{}_chunk_{}", doc_id, index),
            document_id: doc_id.to_string(),
            chunk_index: index,
            content: format!("chunk {}", index),
            embedding,
            code: None,
        }
    }

    fn code_chunk(doc_id: &str, index: i64, file_path: &str, file_index: i64) -> Chunk {
        Chunk {
            code: Some(CodeRef {
                file_path: file_path.to_string(),
                language: "rust".to_string(),
                file_chunk_index: file_index,
            }),
            ..chunk(doc_id, index, vec![1.0, 0.0])
        }
    }

    #[tokio::test]
    async fn create_and_list_documents_newest_first() {
        let store = MemoryStore::new();
        store.create_document(&doc("a", 100)).await.unwrap();
        store.create_document(&doc("b", 200)).await.unwrap();
        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs[0].id, "b");
        assert_eq!(docs[1].id, "a");
    }

    #[tokio::test]
    async fn duplicate_document_id_rejected() {
        let store = MemoryStore::new();
        store.create_document(&doc("a", 1)).await.unwrap();
        assert!(store.create_document(&doc("a", 2)).await.is_err());
    }

    #[tokio::test]
    async fn chunks_for_unknown_document_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create_chunks("ghost", &[chunk("ghost", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn next_edges_link_consecutive_plain_chunks() {
        let store = MemoryStore::new();
        store.create_document(&doc("d", 1)).await.unwrap();
        let chunks: Vec<Chunk> = (0..3).map(|i| chunk("d", i, vec![1.0])).collect();
        store.create_chunks("d", &chunks).await.unwrap();
        let edges = store.next_edges();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0], ("d_chunk_0".to_string(), "d_chunk_1".to_string()));
    }

    #[tokio::test]
    async fn next_edges_do_not_cross_file_boundaries() {
        let store = MemoryStore::new();
        store.create_document(&doc("r", 1)).await.unwrap();
        let chunks = vec![
            code_chunk("r", 0, "src/a.rs", 0),
            code_chunk("r", 1, "src/a.rs", 1),
            code_chunk("r", 2, "src/b.rs", 0),
        ];
        store.create_chunks("r", &chunks).await.unwrap();
        let edges = store.next_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, "r_chunk_0");
        assert_eq!(edges[0].1, "r_chunk_1");
    }

    #[tokio::test]
    async fn delete_cascades_to_chunks_and_edges() {
        let store = MemoryStore::new();
        store.create_document(&doc("d", 1)).await.unwrap();
        let chunks: Vec<Chunk> = (0..2).map(|i| chunk("d", i, vec![1.0])).collect();
        store.create_chunks("d", &chunks).await.unwrap();

        store.delete_document("d").await.unwrap();
        assert!(store.next_edges().is_empty());
        assert!(store.list_documents().await.unwrap().is_empty());
        let err = store.get_document_chunks("d").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_unknown_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete_document("ghost").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_returns_most_similar_first() {
        let store = MemoryStore::new();
        store.create_document(&doc("d", 1)).await.unwrap();
        let chunks = vec![
            chunk("d", 0, vec![0.0, 1.0]),
            chunk("d", 1, vec![1.0, 0.0]),
        ];
        store.create_chunks("d", &chunks).await.unwrap();

        let hits = store.vector_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].chunk_id, "d_chunk_1");
        assert_eq!(hits[0].filename, "d.txt");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn chunk_count_update_round_trips() {
        let store = MemoryStore::new();
        store.create_document(&doc("d", 1)).await.unwrap();
        store.set_chunk_count("d", 7).await.unwrap();
        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs[0].chunk_count, 7);
    }
}
