//! Retrieval-augmented answering.
//!
//! The engine ties the embedder, the graph store, and the generator
//! together: embed the question, rank stored chunks, format the
//! retrieved context, then generate an answer with source attribution.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::generation::Generator;
use crate::models::{Answer, ChatMessage, SearchHit, SourceRef};
use crate::store::GraphStore;

/// Inserted as context when retrieval returns nothing, so the generator
/// can say so instead of hallucinating.
const EMPTY_CONTEXT_NOTE: &str = "No relevant context found in the knowledge base.";

pub struct RagEngine {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    default_top_k: usize,
}

impl RagEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        default_top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            default_top_k,
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Similarity search without generation.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        let k = top_k.unwrap_or(self.default_top_k);
        let embedding = self.embedder.embed(query).await?;
        self.store.vector_search(&embedding, k).await
    }

    /// Answer `question` from the knowledge base.
    ///
    /// An empty knowledge base is not an error: the generator still
    /// runs, with a context note saying nothing was found, and the
    /// answer carries no sources.
    pub async fn answer(
        &self,
        question: &str,
        top_k: Option<usize>,
        history: &[ChatMessage],
    ) -> Result<Answer> {
        let hits = self.search(question, top_k).await?;

        let context = format_context(&hits);
        tracing::debug!(question, hits = hits.len(), "retrieved context");

        let text = self
            .generator
            .generate(question, &context, history)
            .await?;

        Ok(Answer {
            text,
            sources: dedup_sources(&hits),
        })
    }
}

/// Format retrieved chunks as numbered, attributed context blocks.
fn format_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return EMPTY_CONTEXT_NOTE.to_string();
    }

    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let label = match &hit.file_path {
            Some(path) => format!("{} ({})", hit.filename, path),
            None => hit.filename.clone(),
        };
        out.push_str(&format!("[Source {} - {}]\n{}\n", i + 1, label, hit.content));
        if i + 1 < hits.len() {
            out.push('\n');
        }
    }
    out
}

/// Collapse hits into one source reference per (filename, file path)
/// pair, keeping the best score and the retrieval order.
fn dedup_sources(hits: &[SearchHit]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();
    for hit in hits {
        if sources
            .iter()
            .any(|s| s.filename == hit.filename && s.file_path == hit.file_path)
        {
            continue;
        }
        sources.push(SourceRef {
            document_id: hit.document_id.clone(),
            filename: hit.filename.clone(),
            file_path: hit.file_path.clone(),
            score: hit.score,
        });
    }
    sources
}
