//! Retrieval service: the single search surface callers depend on.
//!
//! Binds one [`BackendConfig`] to one [`VectorStoreBackend`] at construction
//! and forwards searches to it unchanged. Cloning is cheap and clones share
//! the same backend and network client.

use std::sync::Arc;

use rekall_core::{Error, Result};
use tracing::{info, instrument};

use crate::backend::{create_backend, VectorStoreBackend};
use crate::config::{BackendConfig, BackendKind};
use crate::embedding::EmbeddingProvider;
use crate::types::{Metadata, ScoredResult, SearchRequest};

/// Semantic retrieval over the configured vector store.
#[derive(Clone)]
pub struct RetrievalService {
    config: Arc<BackendConfig>,
    backend: Arc<dyn VectorStoreBackend>,
}

impl RetrievalService {
    /// Bind `config` to a concrete backend.
    ///
    /// Fails with a config error when the kind has no backend (`base`) or
    /// the backend cannot be constructed.
    pub fn new(config: BackendConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(&config, embedder)?;
        info!(
            backend = %config.kind(),
            embeddings_model = config.embeddings_model(),
            "retrieval service ready"
        );
        Self::with_backend(config, backend)
    }

    /// Bind `config` to an already-built backend.
    ///
    /// The backend must serve the same kind as the config.
    pub fn with_backend(
        config: BackendConfig,
        backend: Arc<dyn VectorStoreBackend>,
    ) -> Result<Self> {
        if backend.kind() != config.kind() {
            return Err(Error::config(format!(
                "backend '{}' does not match config kind '{}'",
                backend.kind(),
                config.kind()
            )));
        }
        Ok(Self {
            config: Arc::new(config),
            backend,
        })
    }

    /// Search for the documents most similar to `query`.
    ///
    /// `k` of `None` uses the backend default. Results are ordered by score
    /// descending; scores are only comparable within one call.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<Metadata>,
        namespace: Option<&str>,
    ) -> Result<Vec<ScoredResult>> {
        let request = SearchRequest {
            query: query.to_string(),
            k,
            filter,
            namespace: namespace.map(str::to_string),
        };
        self.execute(&request).await
    }

    /// Run a prepared search request.
    #[instrument(skip_all, fields(backend = %self.backend_kind(), k = ?request.k))]
    pub async fn execute(&self, request: &SearchRequest) -> Result<Vec<ScoredResult>> {
        self.backend.search(request).await
    }

    /// The bound configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The bound backend kind.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// The bound backend.
    pub fn backend(&self) -> &Arc<dyn VectorStoreBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("backend", &self.backend.name())
            .field("embeddings_model", &self.config.embeddings_model())
            .finish()
    }
}
