//! # GraphRAG CLI (`grag`)
//!
//! The `grag` binary is the primary interface to the retrieval engine.
//! It provides commands for schema initialization, document and
//! repository ingestion, question answering, document management, and
//! starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! grag --config ./config/graphrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `grag init` | Connect to Neo4j and create constraints and indexes |
//! | `grag ingest <file>` | Ingest a document (txt, md, pdf, docx) |
//! | `grag repo <url>` | Clone and ingest a Git repository |
//! | `grag ask "<question>"` | Answer a question from the knowledge base |
//! | `grag documents` | List ingested documents |
//! | `grag delete <id>` | Delete a document and its chunks |
//! | `grag chunks <id>` | Show a document's chunks |
//! | `grag serve` | Start the JSON HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use graphrag::config::{load_config, Config};
use graphrag::embedding::{Embedder, HttpEmbedder};
use graphrag::engine::RagEngine;
use graphrag::generation::GeminiGenerator;
use graphrag::ingest::DocumentProcessor;
use graphrag::repo::RepositoryProcessor;
use graphrag::server::{run_server, AppState};
use graphrag::splitter::TextSplitter;
use graphrag::store::{GraphStore, Neo4jStore};

/// GraphRAG CLI — graph-backed retrieval-augmented generation for
/// documents and code.
#[derive(Parser)]
#[command(
    name = "grag",
    about = "Graph-backed retrieval-augmented generation for documents and code",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/graphrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Neo4j and create constraints and indexes.
    ///
    /// Idempotent: safe to run repeatedly. Reports whether the native
    /// vector index is available.
    Init,

    /// Ingest a document file (txt, md, pdf, docx).
    Ingest {
        /// Path to the file to ingest.
        file: PathBuf,
    },

    /// Clone a Git repository and ingest its source files.
    Repo {
        /// Clone URL (https or ssh).
        url: String,
    },

    /// Answer a question from the knowledge base.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List ingested documents.
    Documents,

    /// Delete a document and all of its chunks.
    Delete {
        /// Document id.
        id: String,
    },

    /// Show a document's chunks in order.
    Chunks {
        /// Document id.
        id: String,
    },

    /// Start the JSON HTTP server.
    Serve,
}

struct Components {
    store: Arc<Neo4jStore>,
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
}

async fn build_components(cfg: &Config) -> anyhow::Result<Components> {
    let store = Arc::new(Neo4jStore::connect(&cfg.neo4j, &cfg.embedding).await?);
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(&cfg.embedding)?);
    let splitter = TextSplitter::new(cfg.chunking.chunk_size, cfg.chunking.chunk_overlap)?;
    Ok(Components {
        store,
        embedder,
        splitter,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = Neo4jStore::connect(&cfg.neo4j, &cfg.embedding).await?;
            if store.has_vector_index() {
                println!("Schema initialized; native vector index available.");
            } else {
                println!(
                    "Schema initialized; vector index unavailable, \
                     similarity search will scan in process."
                );
            }
        }
        Commands::Ingest { file } => {
            let c = build_components(&cfg).await?;
            let processor = DocumentProcessor::new(c.store, c.embedder, c.splitter);

            let bytes = std::fs::read(&file)?;
            if bytes.len() as u64 > cfg.upload.max_file_size {
                anyhow::bail!(
                    "{} exceeds the upload limit of {} bytes",
                    file.display(),
                    cfg.upload.max_file_size
                );
            }
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());

            let report = processor.process(&bytes, &filename).await?;
            println!(
                "Ingested {} ({} bytes) as {} with {} chunks.",
                report.filename, report.size, report.id, report.chunks_created
            );
        }
        Commands::Repo { url } => {
            let c = build_components(&cfg).await?;
            let processor =
                RepositoryProcessor::new(c.store, c.embedder, c.splitter, &cfg.repository)?;

            let report = processor.process(&url).await?;
            println!(
                "Ingested {} as {}: {} files, {} chunks.",
                report.filename,
                report.id,
                report.file_count.unwrap_or(0),
                report.chunks_created
            );
        }
        Commands::Ask { question, top_k } => {
            let c = build_components(&cfg).await?;
            let generator = Arc::new(GeminiGenerator::new(&cfg.generation)?);
            let engine = RagEngine::new(c.store, c.embedder, generator, cfg.retrieval.top_k);

            let answer = engine.answer(&question, top_k, &[]).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for source in &answer.sources {
                    match &source.file_path {
                        Some(path) => {
                            println!("  {} ({})  score {:.3}", source.filename, path, source.score)
                        }
                        None => println!("  {}  score {:.3}", source.filename, source.score),
                    }
                }
            }
        }
        Commands::Documents => {
            let store = Neo4jStore::connect(&cfg.neo4j, &cfg.embedding).await?;
            let docs = store.list_documents().await?;
            if docs.is_empty() {
                println!("No documents ingested.");
            } else {
                for doc in docs {
                    let kind = match &doc.repo {
                        Some(repo) => format!("repository, {} files", repo.file_count),
                        None => "document".to_string(),
                    };
                    println!(
                        "{}  {}  ({}, {} chunks, {} bytes)",
                        doc.id, doc.filename, kind, doc.chunk_count, doc.file_size
                    );
                }
            }
        }
        Commands::Delete { id } => {
            let store = Neo4jStore::connect(&cfg.neo4j, &cfg.embedding).await?;
            store.delete_document(&id).await?;
            println!("Deleted document {}.", id);
        }
        Commands::Chunks { id } => {
            let store = Neo4jStore::connect(&cfg.neo4j, &cfg.embedding).await?;
            let chunks = store.get_document_chunks(&id).await?;
            for chunk in chunks {
                match (&chunk.file_path, &chunk.language) {
                    (Some(path), Some(lang)) => println!(
                        "[{}] {} ({}, {} chars)",
                        chunk.chunk_index, path, lang, chunk.length
                    ),
                    _ => println!("[{}] {} chars", chunk.chunk_index, chunk.length),
                }
                println!("{}\n", chunk.content);
            }
        }
        Commands::Serve => {
            let c = build_components(&cfg).await?;
            let generator = Arc::new(GeminiGenerator::new(&cfg.generation)?);

            let store: Arc<dyn GraphStore> = c.store;
            let engine = Arc::new(RagEngine::new(
                store.clone(),
                c.embedder.clone(),
                generator,
                cfg.retrieval.top_k,
            ));
            let documents = Arc::new(DocumentProcessor::new(
                store.clone(),
                c.embedder.clone(),
                c.splitter.clone(),
            ));
            let repos = Arc::new(RepositoryProcessor::new(
                store,
                c.embedder,
                c.splitter,
                &cfg.repository,
            )?);

            let state = AppState {
                engine,
                documents,
                repos,
                upload_max: cfg.upload.max_file_size,
            };
            run_server(&cfg.server.bind, state).await?;
        }
    }

    Ok(())
}
