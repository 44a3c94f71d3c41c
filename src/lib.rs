//! Graph-backed retrieval-augmented generation for documents and code.
//!
//! Uploaded documents and cloned repositories are split into
//! overlapping chunks, embedded, and stored as a graph in Neo4j:
//! chunks belong to documents, and consecutive chunks of the same
//! source file are chained so neighborhood context survives retrieval.
//! Questions are embedded with the same model, matched against stored
//! chunks by cosine similarity, and answered by an LLM over the
//! retrieved context with source attribution.
//!
//! # Pipeline
//!
//! ```text
//! upload/clone -> extract -> split -> embed -> graph store
//!                                                  |
//! question -> embed -> vector search -> context -> generate -> answer
//! ```
//!
//! The [`store::GraphStore`] trait is the seam between the pipeline
//! and persistence; [`store::MemoryStore`] provides the same semantics
//! without a database for tests and local experimentation.

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod repo;
pub mod server;
pub mod splitter;
pub mod store;
pub mod tools;

pub use error::{RagError, Result};
