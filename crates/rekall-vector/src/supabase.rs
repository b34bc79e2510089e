//! Supabase vector store backend.
//!
//! Nearest-neighbor search runs inside Postgres (pgvector) behind a stored
//! procedure, conventionally `match_documents(query_embedding, match_count,
//! filter)`. The procedure returns rows of the form:
//!
//! | Field | Type | Purpose |
//! |-------|------|---------|
//! | `metadata` | jsonb | Document metadata, including the text key |
//! | `similarity` | float | Similarity to the query, higher is closer |
//!
//! Other columns (`id`, `content`, ...) are ignored.

use std::sync::Arc;

use async_trait::async_trait;
use rekall_core::{Error, Result};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::backend::{embed_query, finite_score, RowCollector, VectorStoreBackend};
use crate::config::{BackendKind, SupabaseConfig};
use crate::embedding::EmbeddingProvider;
use crate::rpc::{PostgrestClient, RpcClient};
use crate::types::{Document, ScoredResult, SearchRequest};

/// Result count used when a request does not set `k`.
pub const DEFAULT_SUPABASE_K: usize = 4;

/// Supabase-backed vector search backend.
pub struct SupabaseBackend {
    config: SupabaseConfig,
    client: Arc<dyn RpcClient>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SupabaseBackend {
    /// Connect to the project named in `config` over PostgREST.
    pub fn connect(config: SupabaseConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let client = PostgrestClient::new(config.store_url.clone(), config.store_key.clone())?;
        Ok(Self::with_client(config, Arc::new(client), embedder))
    }

    /// Use an existing RPC client.
    pub fn with_client(
        config: SupabaseConfig,
        client: Arc<dyn RpcClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            client,
            embedder,
        }
    }

    /// The bound configuration.
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn params(&self, embedding: Vec<f32>, k: usize, request: &SearchRequest) -> Value {
        let mut params = json!({
            "query_embedding": embedding,
            "match_count": k,
        });
        if let Some(filter) = request.active_filter() {
            params["filter"] = Value::Object(filter.clone());
        }
        params
    }
}

#[async_trait]
impl VectorStoreBackend for SupabaseBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredResult>> {
        request.validate()?;
        if let Some(namespace) = request.active_namespace() {
            return Err(Error::unsupported(format!(
                "supabase backend does not support namespaces (got '{namespace}')"
            )));
        }

        let k = request.effective_k(self.default_k());
        let embedding = embed_query(self.embedder.as_ref(), &request.query).await?;

        let procedure = self.config.query_name.as_str();
        debug!(backend = "supabase", procedure, k, "querying vector store");

        let response = self
            .client
            .call(procedure, self.params(embedding, k, request))
            .await;

        if let Some(err) = response.error {
            error!(
                backend = "supabase",
                procedure,
                error = %err,
                "error fetching documents, returning no results"
            );
            return Ok(Vec::new());
        }

        let mut rows = RowCollector::new(BackendKind::Supabase, self.config.missing_text_key);
        for row in response.data {
            rows.push(parse_row(row, &self.config.text_key))?;
        }
        Ok(rows.finish(k))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Supabase
    }

    fn default_k(&self) -> usize {
        DEFAULT_SUPABASE_K
    }
}

impl std::fmt::Debug for SupabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseBackend")
            .field("table", &self.config.table_name)
            .field("procedure", &self.config.query_name)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

/// Convert one RPC row into a scored document.
fn parse_row(row: Value, text_key: &str) -> Result<ScoredResult> {
    let Value::Object(mut row) = row else {
        return Err(Error::data_integrity("rpc row is not an object"));
    };

    let score = finite_score(row.get("similarity"), "similarity")?;
    let metadata = match row.remove("metadata") {
        Some(Value::Object(metadata)) => metadata,
        Some(_) => return Err(Error::data_integrity("row 'metadata' is not an object")),
        None => return Err(Error::data_integrity("row has no 'metadata'")),
    };

    let document = Document::from_metadata(metadata, text_key)?;
    Ok(ScoredResult::new(document, score))
}

// ============================================================================
// Tests
// ============================================================================
