//! Answer generation backend.
//!
//! The [`Generator`] trait keeps the retrieval engine independent of any
//! particular LLM API; [`GeminiGenerator`] talks to the Gemini
//! `generateContent` endpoint.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};
use crate::models::ChatMessage;

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer to `question` given retrieved `context` and
    /// prior conversation `history`.
    async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ChatMessage],
    ) -> Result<String>;
}

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using the \
provided context. Base your answer on the context below. If the context does not contain \
the answer, say so instead of guessing.";

/// Generator backed by the Gemini API.
pub struct GeminiGenerator {
    config: GenerationConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;

        Ok(Self {
            config: config.clone(),
            api_key,
            client,
        })
    }

    fn request_body(
        &self,
        question: &str,
        context: &str,
        history: &[ChatMessage],
    ) -> serde_json::Value {
        let mut contents = Vec::new();

        for turn in history {
            // Gemini names the assistant role "model"
            let role = if turn.role == "assistant" {
                "model"
            } else {
                "user"
            };
            contents.push(serde_json::json!({
                "role": role,
                "parts": [{"text": turn.content}],
            }));
        }

        let prompt = format!(
            "{}\n\nContext:\n{}\n\nQuestion: {}",
            SYSTEM_PROMPT, context, question
        );
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{"text": prompt}],
        }));

        serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(question, context, history))
            .send()
            .await
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::GenerationUnavailable(format!(
                "generation API error {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;

        parse_generation_response(&json)
    }
}

/// Extract the first candidate's text parts from a `generateContent`
/// response.
fn parse_generation_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            RagError::GenerationUnavailable("invalid response: missing candidates".to_string())
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(RagError::GenerationUnavailable(
            "empty generation response".to_string(),
        ));
    }

    Ok(text)
}
