//! JSON HTTP API over the retrieval pipeline.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/api/upload` | Ingest an uploaded document |
//! | `POST`   | `/api/github` | Clone and ingest a repository |
//! | `POST`   | `/api/chat` | Retrieval-augmented answer |
//! | `GET`    | `/api/documents` | List documents |
//! | `DELETE` | `/api/documents/{id}` | Delete a document and its chunks |
//! | `GET`    | `/api/documents/{id}/chunks` | Inspect a document's chunks |
//! | `GET`    | `/tools/list` | List tool descriptors |
//! | `POST`   | `/tools/{name}` | Invoke a tool by name |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document 123" } }
//! ```
//!
//! Invalid input maps to 400, missing resources to 404, unreachable
//! backends (embedding, storage, generation) to 502, and everything
//! else to 500.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::RagEngine;
use crate::error::RagError;
use crate::ingest::DocumentProcessor;
use crate::models::ChatMessage;
use crate::repo::RepositoryProcessor;
use crate::tools::{descriptors, dispatch, ToolCall};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RagEngine>,
    pub documents: Arc<DocumentProcessor>,
    pub repos: Arc<RepositoryProcessor>,
    /// Upload size ceiling in bytes, applied to the decoded payload.
    pub upload_max: u64,
}

/// Start the HTTP server on `bind`.
pub async fn run_server(bind: &str, state: AppState) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    tracing::info!(bind, "server listening");
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/upload", post(handle_upload))
        .route("/api/github", post(handle_github))
        .route("/api/chat", post(handle_chat))
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/{id}", delete(handle_delete_document))
        .route("/api/documents/{id}/chunks", get(handle_document_chunks))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g. `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::Config(_) | RagError::UnsupportedFormat(_) | RagError::CloneFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            RagError::NotFound(_) => StatusCode::NOT_FOUND,
            RagError::EmbeddingUnavailable(_)
            | RagError::StorageUnavailable(_)
            | RagError::GenerationUnavailable(_) => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/upload ============

#[derive(Deserialize)]
struct UploadRequest {
    filename: String,
    /// File bytes, base64-encoded.
    content_base64: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.filename.trim().is_empty() {
        return Err(bad_request("filename must not be empty"));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.content_base64)
        .map_err(|e| bad_request(format!("invalid base64 content: {}", e)))?;

    if bytes.len() as u64 > state.upload_max {
        return Err(bad_request(format!(
            "file exceeds upload limit of {} bytes",
            state.upload_max
        )));
    }

    let report = state.documents.process(&bytes, &req.filename).await?;
    Ok(Json(serde_json::to_value(report).unwrap_or_default()))
}

// ============ POST /api/github ============

#[derive(Deserialize)]
struct GithubRequest {
    repo_url: String,
}

async fn handle_github(
    State(state): State<AppState>,
    Json(req): Json<GithubRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.repo_url.trim().is_empty() {
        return Err(bad_request("repo_url must not be empty"));
    }
    let report = state.repos.process(&req.repo_url).await?;
    Ok(Json(serde_json::to_value(report).unwrap_or_default()))
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    top_k: Option<usize>,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    if req.top_k == Some(0) {
        return Err(bad_request("top_k must be >= 1"));
    }

    let answer = state
        .engine
        .answer(&req.message, req.top_k, &req.history)
        .await?;
    Ok(Json(serde_json::to_value(answer).unwrap_or_default()))
}

// ============ Document management ============

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let docs = state.engine.store().list_documents().await?;
    Ok(Json(serde_json::json!({ "documents": docs })))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.engine.store().delete_document(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn handle_document_chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let chunks = state.engine.store().get_document_chunks(&id).await?;
    Ok(Json(serde_json::json!({ "document_id": id, "chunks": chunks })))
}

// ============ Tools ============

async fn handle_list_tools() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "tools": descriptors() }))
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let call = ToolCall::parse(&name, &params)?;
    let result = dispatch(call, &state.engine).await?;
    Ok(Json(serde_json::json!({ "result": result })))
}
