//! Embedding backend abstraction and the HTTP implementation.
//!
//! All texts, whether document chunks at ingestion time or questions at
//! query time, pass through the same [`Embedder`] so stored and query
//! vectors always share one model and dimensionality.
//!
//! # Retry Strategy
//!
//! The HTTP embedder uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// An embedding backend.
///
/// Implementations must return one vector per input text, in input
/// order, each of exactly [`Embedder::dims`] elements.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a search query).
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let vectors = self.embed_batch(&texts).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingUnavailable("empty embedding response".to_string()))
    }
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Requests are issued in sub-batches of `batch_size` texts; a failure
/// in any sub-batch fails the whole call, so callers never see a
/// partially embedded batch.
pub struct HttpEmbedder {
    config: EmbeddingConfig,
    api_key: String,
    client: reqwest::Client,
}

impl HttpEmbedder {
    /// Create an embedder from configuration.
    ///
    /// Fails if the API key environment variable is not set or the HTTP
    /// client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            api_key,
            client,
        })
    }

    /// Call the embeddings endpoint once per sub-batch with retry/backoff.
    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.config.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;
                        let vectors = parse_embeddings_response(&json)?;
                        self.check_dims(texts.len(), &vectors)?;
                        return Ok(vectors);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(
                            status = status.as_u16(),
                            attempt,
                            "embedding request failed, retrying"
                        );
                        last_err = Some(RagError::EmbeddingUnavailable(format!(
                            "embedding API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429), don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(RagError::EmbeddingUnavailable(format!(
                        "embedding API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "embedding request failed, retrying");
                    last_err = Some(RagError::EmbeddingUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            RagError::EmbeddingUnavailable("embedding failed after retries".to_string())
        }))
    }

    fn check_dims(&self, expected_count: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected_count {
            return Err(RagError::EmbeddingUnavailable(format!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                expected_count,
                vectors.len()
            )));
        }
        for v in vectors {
            if v.len() != self.config.dims {
                return Err(RagError::EmbeddingUnavailable(format!(
                    "embedding dims mismatch: expected {}, got {}",
                    self.config.dims,
                    v.len()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dims(&self) -> usize {
        self.config.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            let vectors = self.embed_once(batch).await?;
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Parse an embeddings API response, extracting `data[].embedding` in order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            RagError::EmbeddingUnavailable("invalid response: missing data array".to_string())
        })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                RagError::EmbeddingUnavailable("invalid response: missing embedding".to_string())
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
