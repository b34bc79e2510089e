//! Embedding provider trait, mock implementation, and factory.
//!
//! The retrieval layer consumes embeddings; it does not produce them. This
//! module defines the `EmbeddingProvider` seam that every backend calls
//! before its remote query.
//!
//! # Providers
//!
//! - `MockEmbeddingProvider`: Deterministic fixed-dimension vectors for testing
//! - `OpenAiEmbeddingProvider`: Remote embeddings over HTTP (see [`crate::openai`])
//! - `RetryingEmbeddingProvider`: Backoff decorator (see [`crate::retry`])

use std::sync::Arc;

use async_trait::async_trait;
use rekall_core::{EnvSource, Error, Result};
use serde::{Deserialize, Serialize};

use crate::openai::{OpenAiEmbeddingProvider, ENV_OPENAI_API_KEY};
use crate::retry::RetryingEmbeddingProvider;

/// Trait for generating text embeddings.
///
/// Implementations must be `Send + Sync` so one provider can serve many
/// in-flight searches. Failures are reported as [`Error::Embedding`] with a
/// [`rekall_core::EmbeddingFailure`] class.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The model identifier this provider serves.
    fn model(&self) -> &str;

    /// The provider name for diagnostics.
    fn name(&self) -> &str;
}

// ============================================================================
// Mock provider
// ============================================================================

/// A mock embedding provider for testing.
///
/// Generates deterministic unit vectors derived from the input bytes.
pub struct MockEmbeddingProvider {
    dimension: usize,
    model: String,
}

impl MockEmbeddingProvider {
    /// Create a new mock provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: "mock".to_string(),
        }
    }

    /// Report a different model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn deterministic_embedding(&self, text: &str) -> Vec<f32> {
        let bytes = text.as_bytes();
        let mut embedding: Vec<f32> = (0..self.dimension)
            .map(|i| {
                let byte = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(0);
                ((byte as f32 + i as f32) % 256.0) / 256.0
            })
            .collect();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.deterministic_embedding(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| self.deterministic_embedding(t))
            .collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Which embedding provider to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    #[default]
    Openai,
    /// Deterministic offline vectors.
    Mock,
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider to build.
    pub provider: EmbeddingProviderKind,

    /// Override for the OpenAI-compatible API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Vector dimension for the mock provider.
    pub dimension: usize,

    /// Retry attempts on rate limiting or unreachable provider (0 disables).
    pub max_retries: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            base_url: None,
            dimension: 1536,
            max_retries: 3,
        }
    }
}

/// Build the embedding provider for `model` from settings.
///
/// The OpenAI key is read from `OPENAI_API_KEY` through `env`.
pub fn create_embedding_provider(
    settings: &EmbeddingSettings,
    model: &str,
    env: &dyn EnvSource,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match settings.provider {
        EmbeddingProviderKind::Mock => {
            if settings.dimension == 0 {
                return Err(Error::config("mock embedding dimension must be at least 1"));
            }
            Arc::new(MockEmbeddingProvider::new(settings.dimension).with_model(model))
        }
        EmbeddingProviderKind::Openai => {
            let api_key = env.var(ENV_OPENAI_API_KEY).ok_or_else(|| {
                Error::config(format!("{ENV_OPENAI_API_KEY} is required for openai embeddings"))
            })?;
            let provider = match &settings.base_url {
                Some(url) => OpenAiEmbeddingProvider::with_base_url(api_key, model, url)?,
                None => OpenAiEmbeddingProvider::new(api_key, model)?,
            };
            Arc::new(provider)
        }
    };

    if settings.max_retries == 0 {
        return Ok(provider);
    }
    Ok(Arc::new(
        RetryingEmbeddingProvider::new(provider).with_max_retries(settings.max_retries),
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rekall_core::MapEnv;

    #[test]
    fn test_mock_provider_creation() {
        let provider = MockEmbeddingProvider::new(384).with_model("text-embedding-ada-002");
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.name(), "mock");
        assert_eq!(provider.model(), "text-embedding-ada-002");
    }

    #[tokio::test]
    async fn test_mock_embed_single() {
        let provider = MockEmbeddingProvider::new(8);
        let embedding = provider.embed("hello world").await.unwrap();

        assert_eq!(embedding.len(), 8);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mock_embed_deterministic() {
        let provider = MockEmbeddingProvider::new(16);
        let e1 = provider.embed("same text").await.unwrap();
        let e2 = provider.embed("same text").await.unwrap();
        assert_eq!(e1, e2);

        let e3 = provider.embed("other text").await.unwrap();
        assert_ne!(e1, e3);
    }

    #[tokio::test]
    async fn test_mock_embed_batch() {
        let provider = MockEmbeddingProvider::new(8);
        let embeddings = provider.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert!(embeddings.iter().all(|e| e.len() == 8));
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn EmbeddingProvider) {}
    }

    // ------------------------------------------------------------------------
    // Factory tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_embedding_settings_default() {
        let settings = EmbeddingSettings::default();
        assert_eq!(settings.provider, EmbeddingProviderKind::Openai);
        assert_eq!(settings.dimension, 1536);
        assert_eq!(settings.max_retries, 3);
        assert!(settings.base_url.is_none());
    }

    #[test]
    fn test_create_mock_provider() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Mock,
            dimension: 4,
            max_retries: 0,
            ..Default::default()
        };
        let provider =
            create_embedding_provider(&settings, "text-embedding-ada-002", &MapEnv::new())
                .unwrap();
        assert_eq!(provider.name(), "mock");
        assert_eq!(provider.model(), "text-embedding-ada-002");
    }

    #[test]
    fn test_create_provider_wraps_with_retry() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Mock,
            dimension: 4,
            ..Default::default()
        };
        let provider = create_embedding_provider(&settings, "m", &MapEnv::new()).unwrap();
        assert_eq!(provider.name(), "retrying");
        assert_eq!(provider.model(), "m");
    }

    #[test]
    fn test_create_openai_provider_requires_key() {
        let settings = EmbeddingSettings::default();
        let err = create_embedding_provider(&settings, "m", &MapEnv::new())
            .err()
            .unwrap();
        assert_eq!(err.kind(), rekall_core::ErrorKind::Config);

        let env = MapEnv::new().with(ENV_OPENAI_API_KEY, "sk-test");
        assert!(create_embedding_provider(&settings, "m", &env).is_ok());
    }

    #[test]
    fn test_create_mock_provider_zero_dimension() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderKind::Mock,
            dimension: 0,
            ..Default::default()
        };
        assert!(create_embedding_provider(&settings, "m", &MapEnv::new()).is_err());
    }
}
