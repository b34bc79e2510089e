//! Pinecone vector store backend.
//!
//! Queries go to the index's data-plane host (`POST {host}/query`). The
//! host is taken from `index` when it already looks like one, otherwise it
//! is resolved once through the control plane and cached for the life of
//! the backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rekall_core::{Error, Result, Secret};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::backend::{embed_query, finite_score, RowCollector, VectorStoreBackend};
use crate::config::{BackendKind, MissingTextKeyPolicy, PineconeConfig, ENV_PINECONE_API_KEY};
use crate::embedding::EmbeddingProvider;
use crate::types::{Document, Metadata, ScoredResult, SearchRequest};

/// Control-plane base URL for serverless and current pod indexes.
pub const PINECONE_CONTROL_PLANE: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2024-07";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pinecone-backed vector search backend.
pub struct PineconeBackend {
    config: PineconeConfig,
    api_key: Secret,
    embedder: Arc<dyn EmbeddingProvider>,
    client: reqwest::Client,
    control_plane: String,
    host: OnceCell<String>,
}

impl PineconeBackend {
    /// Create a backend for the index named in `config`.
    ///
    /// No network traffic happens here; host lookup is deferred to the
    /// first search.
    pub fn connect(config: PineconeConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_blank())
            .ok_or_else(|| Error::config(format!(
                "pinecone backend requires an api key (set 'api_key' or {ENV_PINECONE_API_KEY})"
            )))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let host = OnceCell::new_with(direct_host(&config.index));

        Ok(Self {
            config,
            api_key,
            embedder,
            client,
            control_plane: PINECONE_CONTROL_PLANE.to_string(),
            host,
        })
    }

    /// Use a different control-plane base URL for host lookup.
    pub fn with_control_plane(mut self, url: impl Into<String>) -> Self {
        self.control_plane = url.into().trim_end_matches('/').to_string();
        self
    }

    /// The bound configuration.
    pub fn config(&self) -> &PineconeConfig {
        &self.config
    }

    /// The data-plane host, looked up on first use.
    ///
    /// A failed or cancelled lookup leaves the cell empty, so the next
    /// search tries again.
    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| self.lookup_host())
            .await?;
        Ok(host.as_str())
    }

    async fn lookup_host(&self) -> Result<String> {
        let url = describe_index_url(
            &self.control_plane,
            &self.config.index,
            self.config.api_environment.as_deref(),
        );
        debug!(backend = "pinecone", index = %self.config.index, "looking up index host");

        let response = self
            .client
            .get(&url)
            .header("Api-Key", self.api_key.expose())
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| Error::remote_query(format!("index lookup failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::remote_query(format!(
                "index lookup error {status}: {error_text}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::remote_query(format!("failed to parse index description: {e}")))?;

        host_from_description(&body).ok_or_else(|| {
            Error::remote_query(format!(
                "index description for '{}' has no host",
                self.config.index
            ))
        })
    }

    async fn query(&self, host: &str, body: Value) -> Result<QueryResponse> {
        let response = self
            .client
            .post(format!("{host}/query"))
            .header("Api-Key", self.api_key.expose())
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::remote_query(format!("query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::remote_query(format!(
                "query error {status}: {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::remote_query(format!("failed to parse query response: {e}")))
    }
}

#[async_trait]
impl VectorStoreBackend for PineconeBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredResult>> {
        request.validate()?;

        let k = request.effective_k(self.default_k());
        let embedding = embed_query(self.embedder.as_ref(), &request.query).await?;

        let outcome = match self.host().await {
            Ok(host) => {
                debug!(backend = "pinecone", host, k, "querying vector store");
                self.query(host, query_body(embedding, k, request)).await
            }
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                error!(
                    backend = "pinecone",
                    index = %self.config.index,
                    error = %e,
                    "error fetching documents, returning no results"
                );
                return Ok(Vec::new());
            }
        };

        let mut rows = RowCollector::new(BackendKind::Pinecone, MissingTextKeyPolicy::DropRow);
        for m in response.matches {
            rows.push(m.into_scored(&self.config.text_key))?;
        }
        Ok(rows.finish(k))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Pinecone
    }

    fn default_k(&self) -> usize {
        self.config.top_k
    }
}

impl std::fmt::Debug for PineconeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeBackend")
            .field("index", &self.config.index)
            .field("host", &self.host.get())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    id: String,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl QueryMatch {
    fn into_scored(self, text_key: &str) -> Result<ScoredResult> {
        let score = finite_score(self.score.as_ref(), "score")
            .map_err(|e| Error::data_integrity(format!("match '{}': {e}", self.id)))?;
        let document = Document::from_metadata(self.metadata.unwrap_or_default(), text_key)
            .map_err(|e| Error::data_integrity(format!("match '{}': {e}", self.id)))?;
        Ok(ScoredResult::new(document, score))
    }
}

/// The host to use without a lookup, if `index` already names one.
fn direct_host(index: &str) -> Option<String> {
    let index = index.trim().trim_end_matches('/');
    if index.starts_with("https://") || index.starts_with("http://") {
        Some(index.to_string())
    } else if index.contains('.') {
        Some(format!("https://{index}"))
    } else {
        None
    }
}

/// Control-plane URL describing `index`.
///
/// A legacy pod environment routes to its regional controller.
fn describe_index_url(control_plane: &str, index: &str, environment: Option<&str>) -> String {
    match environment.filter(|e| !e.trim().is_empty()) {
        Some(env) => format!("https://controller.{env}.pinecone.io/databases/{index}"),
        None => format!("{control_plane}/indexes/{index}"),
    }
}

/// Extract the data-plane host from an index description.
fn host_from_description(body: &Value) -> Option<String> {
    let host = body
        .get("host")
        .or_else(|| body.pointer("/status/host"))
        .and_then(Value::as_str)?;
    direct_host(host).or_else(|| Some(format!("https://{host}")))
}

fn query_body(embedding: Vec<f32>, k: usize, request: &SearchRequest) -> Value {
    let mut body = json!({
        "vector": embedding,
        "topK": k,
        "includeMetadata": true,
    });
    if let Some(filter) = request.active_filter() {
        body["filter"] = Value::Object(filter.clone());
    }
    if let Some(namespace) = request.active_namespace() {
        body["namespace"] = Value::String(namespace.to_string());
    }
    body
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use rekall_core::ErrorKind;

    fn config(index: &str) -> PineconeConfig {
        let mut config = PineconeConfig::new(index);
        config.api_key = Some(Secret::new("pc-key"));
        config
    }

    fn backend(index: &str) -> PineconeBackend {
        PineconeBackend::connect(config(index), Arc::new(MockEmbeddingProvider::new(3))).unwrap()
    }

    // ------------------------------------------------------------------------
    // Host resolution tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_direct_host() {
        assert_eq!(
            direct_host("https://docs-abc123.svc.us-east-1.pinecone.io/"),
            Some("https://docs-abc123.svc.us-east-1.pinecone.io".to_string())
        );
        assert_eq!(
            direct_host("docs-abc123.svc.us-east-1.pinecone.io"),
            Some("https://docs-abc123.svc.us-east-1.pinecone.io".to_string())
        );
        assert_eq!(direct_host("docs"), None);
    }

    #[test]
    fn test_describe_index_url() {
        assert_eq!(
            describe_index_url(PINECONE_CONTROL_PLANE, "docs", None),
            "https://api.pinecone.io/indexes/docs"
        );
        assert_eq!(
            describe_index_url(PINECONE_CONTROL_PLANE, "docs", Some("us-west1-gcp")),
            "https://controller.us-west1-gcp.pinecone.io/databases/docs"
        );
        assert_eq!(
            describe_index_url(PINECONE_CONTROL_PLANE, "docs", Some("")),
            "https://api.pinecone.io/indexes/docs"
        );
    }

    #[test]
    fn test_host_from_description() {
        assert_eq!(
            host_from_description(&json!({"name": "docs", "host": "docs-1.svc.pinecone.io"})),
            Some("https://docs-1.svc.pinecone.io".to_string())
        );
        assert_eq!(
            host_from_description(&json!({"status": {"host": "docs-1.svc.pinecone.io"}})),
            Some("https://docs-1.svc.pinecone.io".to_string())
        );
        assert_eq!(host_from_description(&json!({"name": "docs"})), None);
    }

    #[tokio::test]
    async fn test_host_used_directly_without_lookup() {
        let backend = backend("https://docs-1.svc.pinecone.io");
        assert_eq!(backend.host().await.unwrap(), "https://docs-1.svc.pinecone.io");
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let backend = backend("docs").with_control_plane("http://127.0.0.1:9");
        assert!(backend.host().await.is_err());
        assert!(backend.host.get().is_none());
        assert!(backend.host().await.is_err());
    }

    // ------------------------------------------------------------------------
    // Request and response tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_query_body() {
        let request = SearchRequest::new("q")
            .with_filter_value("genre", "faq")
            .with_namespace("tenant-a");
        let body = query_body(vec![0.1, 0.2], 5, &request);

        assert_eq!(body["topK"], 5);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["vector"].as_array().unwrap().len(), 2);
        assert_eq!(body["filter"], json!({"genre": "faq"}));
        assert_eq!(body["namespace"], "tenant-a");
    }

    #[test]
    fn test_query_body_omits_inactive_options() {
        let body = query_body(vec![0.1], 3, &SearchRequest::new("q").with_namespace(""));
        assert!(body.get("filter").is_none());
        assert!(body.get("namespace").is_none());
    }

    #[test]
    fn test_match_conversion() {
        let response: QueryResponse = serde_json::from_value(json!({
            "matches": [
                {"id": "a", "score": 0.8, "metadata": {"text": "alpha", "source": "a.md"}},
                {"id": "b", "score": 0.9},
                {"id": "c", "metadata": {"text": "gamma"}}
            ],
            "namespace": ""
        }))
        .unwrap();

        let mut matches = response.matches.into_iter();
        let a = matches.next().unwrap().into_scored("text").unwrap();
        assert_eq!(a.document.content(), "alpha");
        assert_eq!(a.document.get("source"), Some(&json!("a.md")));
        assert_eq!(a.score, 0.8);

        let err = matches.next().unwrap().into_scored("text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("'b'"));

        let err = matches.next().unwrap().into_scored("text").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    }

    // ------------------------------------------------------------------------
    // Search tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_search_unreachable_host_degrades_to_empty() {
        let backend = backend("http://127.0.0.1:9");
        let results = backend
            .search(&SearchRequest::new("refund policy").with_namespace("tenant-a"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_validates_first() {
        let backend = backend("http://127.0.0.1:9");
        let err = backend.search(&SearchRequest::new(" ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_connect_requires_key() {
        let err = PineconeBackend::connect(
            PineconeConfig::new("docs"),
            Arc::new(MockEmbeddingProvider::new(3)),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_default_k_is_top_k() {
        let mut config = config("docs");
        config.top_k = 7;
        let backend =
            PineconeBackend::connect(config, Arc::new(MockEmbeddingProvider::new(3))).unwrap();
        assert_eq!(backend.default_k(), 7);
        assert_eq!(backend.name(), "pinecone");
    }
}
