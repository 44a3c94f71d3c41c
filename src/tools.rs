//! Tool surface for agent integrations.
//!
//! A small, closed set of callable tools over the retrieval engine,
//! each with a JSON-schema descriptor so external agents can discover
//! and invoke them over the HTTP boundary.

use serde_json::{json, Value};

use crate::engine::RagEngine;
use crate::error::{RagError, Result};

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Retrieval-augmented question answering.
    QueryKnowledgeBase {
        question: String,
        top_k: Option<usize>,
    },
    /// Enumerate ingested documents.
    ListDocuments,
    /// Raw similarity search without generation.
    SearchSimilarContent {
        query: String,
        top_k: Option<usize>,
    },
}

impl ToolCall {
    /// Parse a named tool invocation. Unknown names and missing
    /// required parameters are rejected before any backend work runs.
    pub fn parse(name: &str, params: &Value) -> Result<Self> {
        match name {
            "query_knowledge_base" => Ok(ToolCall::QueryKnowledgeBase {
                question: required_str(params, "question")?,
                top_k: optional_usize(params, "top_k")?,
            }),
            "list_documents" => Ok(ToolCall::ListDocuments),
            "search_similar_content" => Ok(ToolCall::SearchSimilarContent {
                query: required_str(params, "query")?,
                top_k: optional_usize(params, "top_k")?,
            }),
            other => Err(RagError::NotFound(format!("tool {}", other))),
        }
    }
}

fn required_str(params: &Value, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| RagError::Config(format!("missing required parameter: {}", key)))
}

fn optional_usize(params: &Value, key: &str) -> Result<Option<usize>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .filter(|&n| n > 0)
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                RagError::Config(format!("parameter {} must be a positive integer", key))
            }),
    }
}

/// Descriptors for every available tool, in a fixed order.
pub fn descriptors() -> Value {
    json!([
        {
            "name": "query_knowledge_base",
            "description": "Answer a question using the knowledge base, with source attribution.",
            "parameters": {
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "The question to answer."},
                    "top_k": {"type": "integer", "description": "Number of chunks to retrieve.", "minimum": 1}
                },
                "required": ["question"]
            }
        },
        {
            "name": "list_documents",
            "description": "List all documents in the knowledge base.",
            "parameters": {
                "type": "object",
                "properties": {}
            }
        },
        {
            "name": "search_similar_content",
            "description": "Find chunks similar to a query, without generating an answer.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The text to search for."},
                    "top_k": {"type": "integer", "description": "Number of chunks to return.", "minimum": 1}
                },
                "required": ["query"]
            }
        }
    ])
}

/// Execute a parsed tool call against the engine.
pub async fn dispatch(call: ToolCall, engine: &RagEngine) -> Result<Value> {
    match call {
        ToolCall::QueryKnowledgeBase { question, top_k } => {
            let answer = engine.answer(&question, top_k, &[]).await?;
            Ok(serde_json::to_value(answer).unwrap_or(Value::Null))
        }
        ToolCall::ListDocuments => {
            let docs = engine.store().list_documents().await?;
            Ok(json!({ "documents": docs }))
        }
        ToolCall::SearchSimilarContent { query, top_k } => {
            let hits = engine.search(&query, top_k).await?;
            Ok(json!({ "results": hits }))
        }
    }
}
