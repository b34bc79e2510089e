//! Vector store backend trait and factory.
//!
//! One implementation per [`BackendKind`] that has a concrete store.
//! Every backend follows the same search contract:
//!
//! 1. Validate the request (empty query or `k == 0` is a validation error).
//! 2. Reject filter/namespace arguments the store cannot honour.
//! 3. Embed the query. Failure aborts the search.
//! 4. Run the remote similarity query. Failure is logged and yields no
//!    results.
//! 5. Convert rows, dropping malformed ones.
//! 6. Sort by score descending (stable) and truncate to `k`.

use std::sync::Arc;

use async_trait::async_trait;
use rekall_core::{EmbeddingFailure, Error, ErrorKind, Result};
use tracing::{debug, warn};

use crate::config::{BackendConfig, BackendKind, MissingTextKeyPolicy};
use crate::embedding::EmbeddingProvider;
use crate::pinecone::PineconeBackend;
use crate::supabase::SupabaseBackend;
use crate::types::{rank_results, ScoredResult, SearchRequest};

/// Trait for vector similarity search backends.
///
/// Backends hold no per-call mutable state, so one instance can serve
/// concurrent searches. Dropping a search future mid-flight aborts only
/// that request.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Search for the documents most similar to `request.query`.
    ///
    /// Returns at most `k` results ordered by score descending. An empty
    /// result is a valid outcome, including after a remote-query failure.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredResult>>;

    /// The backend kind.
    fn kind(&self) -> BackendKind;

    /// Result count used when a request does not set `k`.
    fn default_k(&self) -> usize;

    /// Get the backend name for diagnostics.
    fn name(&self) -> &str {
        self.kind().as_str()
    }
}

/// Create a backend for the given configuration.
///
/// The `base` kind carries only common fields and has no store to bind.
pub fn create_backend(
    config: &BackendConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn VectorStoreBackend>> {
    match config {
        BackendConfig::Supabase(c) => Ok(Arc::new(SupabaseBackend::connect(c.clone(), embedder)?)),
        BackendConfig::Pinecone(c) => Ok(Arc::new(PineconeBackend::connect(c.clone(), embedder)?)),
        BackendConfig::Base(_) => Err(Error::config(
            "backend kind 'base' has no vector store; configure 'supabase' or 'pinecone'",
        )),
    }
}

// ============================================================================
// Shared search steps
// ============================================================================

/// Embed a query, reporting any failure as an embedding error.
pub(crate) async fn embed_query(embedder: &dyn EmbeddingProvider, query: &str) -> Result<Vec<f32>> {
    embedder.embed(query).await.map_err(|e| {
        if e.kind() == ErrorKind::Embedding {
            e
        } else {
            Error::embedding(EmbeddingFailure::Other, e.to_string())
        }
    })
}

/// Read a similarity score out of a row field.
pub(crate) fn finite_score(value: Option<&serde_json::Value>, field: &str) -> Result<f64> {
    let score = value
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| Error::data_integrity(format!("row has no numeric '{field}'")))?;
    if !score.is_finite() {
        return Err(Error::data_integrity(format!(
            "row has non-finite '{field}': {score}"
        )));
    }
    Ok(score)
}

/// Accumulates converted rows under a missing-data policy.
pub(crate) struct RowCollector {
    backend: BackendKind,
    policy: MissingTextKeyPolicy,
    kept: Vec<ScoredResult>,
    dropped: usize,
}

impl RowCollector {
    pub(crate) fn new(backend: BackendKind, policy: MissingTextKeyPolicy) -> Self {
        Self {
            backend,
            policy,
            kept: Vec::new(),
            dropped: 0,
        }
    }

    /// Admit one converted row. Under `FailBatch` a bad row fails the call.
    pub(crate) fn push(&mut self, row: Result<ScoredResult>) -> Result<()> {
        match row {
            Ok(result) => self.kept.push(result),
            Err(e) => match self.policy {
                MissingTextKeyPolicy::DropRow => {
                    warn!(backend = %self.backend, error = %e, "dropping malformed row");
                    self.dropped += 1;
                }
                MissingTextKeyPolicy::FailBatch => return Err(e),
            },
        }
        Ok(())
    }

    /// Rank what was kept and truncate to `k`.
    pub(crate) fn finish(self, k: usize) -> Vec<ScoredResult> {
        debug!(
            backend = %self.backend,
            rows = self.kept.len(),
            dropped = self.dropped,
            k,
            "search rows collected"
        );
        rank_results(self.kept, k)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BaseConfig, PineconeConfig, SupabaseConfig};
    use crate::embedding::MockEmbeddingProvider;
    use crate::types::{Document, Metadata};
    use rekall_core::Secret;
    use serde_json::json;

    fn embedder() -> Arc<dyn EmbeddingProvider> {
        Arc::new(MockEmbeddingProvider::new(4))
    }

    fn scored(content: &str, score: f64) -> ScoredResult {
        ScoredResult::new(Document::new(content, Metadata::new()), score)
    }

    // ------------------------------------------------------------------------
    // Factory tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_create_backend_supabase() {
        let config = BackendConfig::Supabase(SupabaseConfig::new(
            "https://abc.supabase.co",
            "k",
            "documents",
            "match_documents",
        ));
        let backend = create_backend(&config, embedder()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Supabase);
        assert_eq!(backend.name(), "supabase");
        assert_eq!(backend.default_k(), 4);
    }

    #[test]
    fn test_create_backend_pinecone() {
        let mut pinecone = PineconeConfig::new("docs");
        pinecone.api_key = Some(Secret::new("pc-key"));
        pinecone.top_k = 6;
        let backend = create_backend(&BackendConfig::Pinecone(pinecone), embedder()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Pinecone);
        assert_eq!(backend.default_k(), 6);
    }

    #[test]
    fn test_create_backend_base_is_config_error() {
        let err = create_backend(&BackendConfig::Base(BaseConfig::default()), embedder())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn VectorStoreBackend) {}
    }

    // ------------------------------------------------------------------------
    // Shared step tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_finite_score() {
        assert_eq!(finite_score(Some(&json!(0.5)), "similarity").unwrap(), 0.5);
        assert_eq!(finite_score(Some(&json!(1)), "similarity").unwrap(), 1.0);

        let err = finite_score(Some(&json!("0.5")), "similarity").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(finite_score(None, "similarity").is_err());
    }

    #[test]
    fn test_row_collector_drop_row() {
        let mut rows = RowCollector::new(BackendKind::Supabase, MissingTextKeyPolicy::DropRow);
        rows.push(Ok(scored("a", 0.2))).unwrap();
        rows.push(Err(Error::data_integrity("missing text key"))).unwrap();
        rows.push(Ok(scored("b", 0.9))).unwrap();

        assert_eq!(rows.dropped, 1);
        let ranked = rows.finish(5);
        let order: Vec<&str> = ranked.iter().map(|r| r.document.content()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_row_collector_fail_batch() {
        let mut rows = RowCollector::new(BackendKind::Supabase, MissingTextKeyPolicy::FailBatch);
        rows.push(Ok(scored("a", 0.2))).unwrap();
        let err = rows
            .push(Err(Error::data_integrity("missing text key")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_embed_query_wraps_foreign_errors() {
        struct Broken;

        #[async_trait]
        impl EmbeddingProvider for Broken {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(Error::serialization("bad payload"))
            }
            fn model(&self) -> &str {
                "broken"
            }
            fn name(&self) -> &str {
                "broken"
            }
        }

        let err = embed_query(&Broken, "q").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert_eq!(err.embedding_failure(), Some(EmbeddingFailure::Other));
    }
}
