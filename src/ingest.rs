//! Single-document ingestion pipeline.
//!
//! Extract text, split it, embed every chunk, then persist. Embedding
//! runs before any write so an embedding failure leaves the graph
//! untouched; the document's chunk count is set only after its chunks
//! commit, so a count can undercount mid-ingest but never overcount.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::extract::extract_text;
use crate::models::{Chunk, DocumentMeta, IngestReport};
use crate::splitter::TextSplitter;
use crate::store::GraphStore;

pub struct DocumentProcessor {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
}

impl DocumentProcessor {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            store,
            embedder,
            splitter,
        }
    }

    /// Ingest one uploaded file.
    pub async fn process(&self, bytes: &[u8], filename: &str) -> Result<IngestReport> {
        let text = extract_text(bytes, filename)?;
        if text.trim().is_empty() {
            return Err(RagError::UnsupportedFormat(format!(
                "{} contains no extractable text",
                filename
            )));
        }

        let pieces = self.splitter.split(&text);
        tracing::info!(filename, chunks = pieces.len(), "splitting complete");

        let embeddings = self.embedder.embed_batch(&pieces).await?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let uploaded_at = chrono::Utc::now().timestamp();
        let doc = DocumentMeta {
            id: document_id.clone(),
            filename: filename.to_string(),
            uploaded_at,
            file_size: bytes.len() as i64,
            chunk_count: 0,
            repo: None,
        };

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| Chunk {
                id: format!("{}_chunk_{}", document_id, i),
                document_id: document_id.clone(),
                chunk_index: i as i64,
                content,
                embedding,
                code: None,
            })
            .collect();

        self.store.create_document(&doc).await?;
        self.store.create_chunks(&document_id, &chunks).await?;
        self.store
            .set_chunk_count(&document_id, chunks.len() as i64)
            .await?;

        tracing::info!(filename, document_id = %document_id, chunks = chunks.len(), "document ingested");

        Ok(IngestReport {
            id: document_id,
            filename: filename.to_string(),
            size: bytes.len() as i64,
            uploaded_at,
            chunks_created: chunks.len() as i64,
            file_count: None,
        })
    }
}
