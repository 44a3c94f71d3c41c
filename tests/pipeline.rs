//! End-to-end pipeline tests against the in-memory store.
//!
//! These exercise the same code paths as production: the document and
//! repository processors, the engine, and tool dispatch, with the
//! embedding and generation backends replaced by deterministic stubs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use graphrag::embedding::Embedder;
use graphrag::engine::RagEngine;
use graphrag::error::{RagError, Result};
use graphrag::generation::Generator;
use graphrag::ingest::DocumentProcessor;
use graphrag::models::ChatMessage;
use graphrag::repo::RepositoryProcessor;
use graphrag::splitter::TextSplitter;
use graphrag::store::{GraphStore, MemoryStore};
use graphrag::tools::{dispatch, ToolCall};

/// Deterministic 3-dimensional embedder: counts of "alpha" and "beta"
/// plus a constant component so no vector is ever zero.
struct TestEmbedder;

#[async_trait]
impl Embedder for TestEmbedder {
    fn model_name(&self) -> &str {
        "test"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                vec![
                    t.matches("alpha").count() as f32,
                    t.matches("beta").count() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

/// Embedder that always fails, for write-ordering tests.
struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        3
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingUnavailable("stub outage".to_string()))
    }
}

/// Generator that records what it was asked and returns a fixed answer.
#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        _history: &[ChatMessage],
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((question.to_string(), context.to_string()));
        Ok("canned answer".to_string())
    }
}

fn splitter(size: usize, overlap: usize) -> TextSplitter {
    TextSplitter::new(size, overlap).unwrap()
}

fn document_processor(store: Arc<MemoryStore>) -> DocumentProcessor {
    DocumentProcessor::new(store, Arc::new(TestEmbedder), splitter(4, 1))
}

fn repo_processor(store: Arc<MemoryStore>) -> RepositoryProcessor {
    RepositoryProcessor::new(
        store,
        Arc::new(TestEmbedder),
        splitter(50, 10),
        &graphrag::config::RepositoryConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn ingest_sets_exact_chunk_count() {
    let store = Arc::new(MemoryStore::new());
    let processor = document_processor(store.clone());

    // 19 chars with size 4 / overlap 1: windows at 0, 3, 6, 9, 12, 15.
    let text = "abcdefghijklmnopqrs";
    let report = processor.process(text.as_bytes(), "doc.txt").await.unwrap();
    assert_eq!(report.chunks_created, 6);

    let docs = store.list_documents().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].chunk_count, 6);

    let chunks = store.get_document_chunks(&report.id).await.unwrap();
    assert_eq!(chunks.len(), 6);
    let indices: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(chunks[0].id, format!("{}_chunk_0", report.id));
}

#[tokio::test]
async fn embedding_failure_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let processor = DocumentProcessor::new(store.clone(), Arc::new(FailingEmbedder), splitter(4, 1));

    let err = processor.process(b"hello world", "doc.txt").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
    assert!(store.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_upload_is_rejected_without_writes() {
    let store = Arc::new(MemoryStore::new());
    let processor = document_processor(store.clone());

    let err = processor.process(b"\x89PNG", "image.png").await.unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(_)));
    assert!(store.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_cascades_to_chunks() {
    let store = Arc::new(MemoryStore::new());
    let processor = document_processor(store.clone());

    let report = processor
        .process(b"alpha alpha alpha", "a.txt")
        .await
        .unwrap();
    assert!(!store.vector_search(&[1.0, 0.0, 1.0], 5).await.unwrap().is_empty());

    store.delete_document(&report.id).await.unwrap();
    assert!(store.vector_search(&[1.0, 0.0, 1.0], 5).await.unwrap().is_empty());
    let err = store.get_document_chunks(&report.id).await.unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
}

#[tokio::test]
async fn answer_ranks_matching_document_first() {
    let store = Arc::new(MemoryStore::new());
    // One chunk per document so ranking is unambiguous.
    let processor =
        DocumentProcessor::new(store.clone(), Arc::new(TestEmbedder), splitter(500, 10));
    processor
        .process(b"alpha alpha alpha alpha", "a.txt")
        .await
        .unwrap();
    processor.process(b"beta beta beta", "b.txt").await.unwrap();

    let generator = Arc::new(RecordingGenerator::default());
    let engine = RagEngine::new(store, Arc::new(TestEmbedder), generator.clone(), 5);

    let answer = engine.answer("alpha", None, &[]).await.unwrap();
    assert_eq!(answer.text, "canned answer");
    assert_eq!(answer.sources[0].filename, "a.txt");
    assert!(answer.sources[0].score > answer.sources[1].score);

    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.starts_with("[Source 1 - a.txt]"));
}

#[tokio::test]
async fn empty_knowledge_base_still_answers_without_sources() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(RecordingGenerator::default());
    let engine = RagEngine::new(store, Arc::new(TestEmbedder), generator.clone(), 5);

    let answer = engine.answer("anything", None, &[]).await.unwrap();
    assert_eq!(answer.text, "canned answer");
    assert!(answer.sources.is_empty());

    let calls = generator.calls.lock().unwrap();
    assert!(calls[0].1.contains("No relevant context found"));
}

#[tokio::test]
async fn repository_chains_stay_within_files() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(src.join("a.py"), "print('hello')\n".repeat(10)).unwrap();
    std::fs::write(src.join("b.py"), "print('world')\n".repeat(8)).unwrap();

    let store = Arc::new(MemoryStore::new());
    let processor = repo_processor(store.clone());
    let report = processor
        .ingest_tree("https://example.com/user/demo.git", "demo", dir.path())
        .await
        .unwrap();

    assert_eq!(report.file_count, Some(2));
    assert_eq!(report.filename, "GitHub: demo");

    // Map chunk id to source file, then require every NEXT edge to stay
    // inside one file.
    let chunks = store.get_document_chunks(&report.id).await.unwrap();
    assert!(chunks.iter().all(|c| c.file_path.is_some()));
    let file_of = |id: &str| {
        chunks
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.file_path.clone())
            .unwrap()
    };

    let edges = store.next_edges();
    assert!(!edges.is_empty());
    for (from, to) in &edges {
        assert_eq!(file_of(from), file_of(to));
    }

    // With n chunks across f files there are exactly n - f edges when
    // every file chains its own chunks.
    assert_eq!(edges.len() as i64, report.chunks_created - 2);
}

#[tokio::test]
async fn repository_skips_oversized_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("small.py"), "x = 1\n".repeat(5)).unwrap();
    std::fs::write(dir.path().join("big.py"), "y = 2\n".repeat(200)).unwrap();

    let store = Arc::new(MemoryStore::new());
    let processor = RepositoryProcessor::new(
        store.clone(),
        Arc::new(TestEmbedder),
        splitter(50, 10),
        &graphrag::config::RepositoryConfig {
            max_file_size: 100,
            exclude_globs: Vec::new(),
        },
    )
    .unwrap();

    let report = processor
        .ingest_tree("https://example.com/user/demo", "demo", dir.path())
        .await
        .unwrap();
    assert_eq!(report.file_count, Some(1));

    let chunks = store.get_document_chunks(&report.id).await.unwrap();
    assert!(chunks
        .iter()
        .all(|c| c.file_path.as_deref() == Some("small.py")));
}

#[tokio::test]
async fn repository_respects_exclude_globs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.py"), "x = 1\n".repeat(5)).unwrap();
    std::fs::write(dir.path().join("skip.py"), "y = 2\n".repeat(5)).unwrap();

    let store = Arc::new(MemoryStore::new());
    let processor = RepositoryProcessor::new(
        store.clone(),
        Arc::new(TestEmbedder),
        splitter(50, 10),
        &graphrag::config::RepositoryConfig {
            max_file_size: 1024 * 1024,
            exclude_globs: vec!["skip.*".to_string()],
        },
    )
    .unwrap();

    let report = processor
        .ingest_tree("https://example.com/user/demo", "demo", dir.path())
        .await
        .unwrap();
    assert_eq!(report.file_count, Some(1));
}

#[tokio::test]
async fn empty_repository_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let processor = repo_processor(store.clone());

    let err = processor
        .ingest_tree("https://example.com/user/empty", "empty", dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(_)));
    assert!(store.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn tools_search_and_list_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let processor =
        DocumentProcessor::new(store.clone(), Arc::new(TestEmbedder), splitter(500, 10));
    processor
        .process(b"alpha notes about the system", "notes.txt")
        .await
        .unwrap();

    let generator = Arc::new(RecordingGenerator::default());
    let engine = RagEngine::new(store, Arc::new(TestEmbedder), generator, 5);

    let call = ToolCall::parse(
        "search_similar_content",
        &serde_json::json!({"query": "alpha", "top_k": 3}),
    )
    .unwrap();
    let result = dispatch(call, &engine).await.unwrap();
    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["filename"], "notes.txt");

    let call = ToolCall::parse("list_documents", &serde_json::json!({})).unwrap();
    let result = dispatch(call, &engine).await.unwrap();
    assert_eq!(result["documents"].as_array().unwrap().len(), 1);

    let call = ToolCall::parse(
        "query_knowledge_base",
        &serde_json::json!({"question": "what is alpha?"}),
    )
    .unwrap();
    let result = dispatch(call, &engine).await.unwrap();
    assert_eq!(result["text"], "canned answer");
}
