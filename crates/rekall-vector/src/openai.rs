//! OpenAI-compatible embedding provider.
//!
//! Calls `POST {base_url}/embeddings` and maps HTTP failures onto the
//! embedding failure classes the retrieval layer understands.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rekall_core::{EmbeddingFailure, Error, Result, Secret};
use serde::Deserialize;

use crate::embedding::EmbeddingProvider;

/// Env var holding the OpenAI API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Default API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Embedding provider backed by an OpenAI-compatible HTTP API.
///
/// The model is not checked at construction; an unknown model surfaces as
/// [`EmbeddingFailure::InvalidModel`] on the first call.
pub struct OpenAiEmbeddingProvider {
    api_key: Secret,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    /// Create a provider against the public OpenAI API.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Model ID (e.g., "text-embedding-ada-002")
    pub fn new(api_key: impl Into<Secret>, model: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_OPENAI_BASE_URL)
    }

    /// Create a provider against a compatible API at `base_url`.
    pub fn with_base_url(
        api_key: impl Into<Secret>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let failure = if e.is_connect() || e.is_timeout() {
                    EmbeddingFailure::Unreachable
                } else {
                    EmbeddingFailure::Other
                };
                Error::embedding(failure, format!("request to embeddings API failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let failure = classify_failure(status, &error_text, retry_after);
            return Err(Error::embedding(
                failure,
                format!("embeddings API error {status}: {error_text}"),
            ));
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            Error::embedding(
                EmbeddingFailure::Other,
                format!("failed to parse embeddings response: {e}"),
            )
        })?;

        Ok(parsed.into_vectors())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(serde_json::Value::String(text.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(EmbeddingFailure::Other, "no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request(serde_json::json!(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(Error::embedding(
                EmbeddingFailure::Other,
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingsResponse {
    fn into_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|d| d.index);
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

/// Map a non-success HTTP status to an embedding failure class.
fn classify_failure(status: StatusCode, body: &str, retry_after: Option<u64>) -> EmbeddingFailure {
    match status {
        StatusCode::TOO_MANY_REQUESTS => EmbeddingFailure::RateLimited {
            retry_after_secs: retry_after,
        },
        StatusCode::NOT_FOUND => EmbeddingFailure::InvalidModel,
        StatusCode::BAD_REQUEST if body.contains("model") => EmbeddingFailure::InvalidModel,
        s if s.is_server_error() => EmbeddingFailure::Unreachable,
        _ => EmbeddingFailure::Other,
    }
}

// ============================================================================
// Tests
// ============================================================================
