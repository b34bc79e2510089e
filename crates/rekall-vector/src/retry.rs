//! Retry wrapper for embedding providers.
//!
//! Rate limiting and transient unreachability are the provider's concern,
//! not the retrieval layer's. This decorator retries only those two
//! failure classes with exponential backoff; everything else is returned
//! on the first attempt. A rate limit that names a `Retry-After` delay
//! waits at least that long.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use rekall_core::{EmbeddingFailure, Error, Result};
use tracing::warn;

use crate::embedding::EmbeddingProvider;

/// Wraps an embedding provider with retry logic.
pub struct RetryingEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryingEmbeddingProvider {
    /// Creates a new retry wrapper with default settings.
    ///
    /// Default settings:
    /// - Max retries: 3
    /// - Initial delay: 500 milliseconds
    /// - Max delay: 10 seconds
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner: provider,
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial delay between retries.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize)
    }

    fn should_retry(error: &Error) -> bool {
        error.is_retryable()
    }

    /// Stretch the next backoff delay to the server's `Retry-After`.
    fn honour_retry_after(error: &Error, delay: Option<Duration>) -> Option<Duration> {
        let delay = delay?;
        match error.embedding_failure() {
            Some(EmbeddingFailure::RateLimited {
                retry_after_secs: Some(secs),
            }) => Some(delay.max(Duration::from_secs(secs))),
            _ => Some(delay),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RetryingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.inner.clone();
        let text = text.to_string();

        (move || {
            let provider = provider.clone();
            let text = text.clone();
            async move { provider.embed(&text).await }
        })
        .retry(self.backoff())
        .when(Self::should_retry)
        .adjust(Self::honour_retry_after)
        .notify(|err: &Error, delay: Duration| {
            warn!(provider = self.inner.name(), error = %err, ?delay, "retrying embedding request");
        })
        .await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = self.inner.clone();
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

        (move || {
            let provider = provider.clone();
            let texts = texts.clone();
            async move {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                provider.embed_batch(&refs).await
            }
        })
        .retry(self.backoff())
        .when(Self::should_retry)
        .adjust(Self::honour_retry_after)
        .notify(|err: &Error, delay: Duration| {
            warn!(provider = self.inner.name(), error = %err, ?delay, "retrying embedding batch");
        })
        .await
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn name(&self) -> &str {
        "retrying"
    }
}
