//! Remote procedure call clients for SQL-backed vector stores.
//!
//! A store such as Supabase exposes nearest-neighbor search as a stored
//! procedure. [`RpcClient`] is the narrow seam the backend calls through:
//! one procedure name, one JSON parameter object, one `{data, error}`
//! response. Transport problems are folded into `error` rather than
//! raised, so the backend can apply its soft-failure policy uniformly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rekall_core::{Result, Secret};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one remote procedure call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcResponse {
    /// Returned rows, in the order the store produced them.
    pub data: Vec<Value>,

    /// Error reported by the store or transport, if any.
    pub error: Option<String>,
}

impl RpcResponse {
    /// A successful response.
    pub fn ok(data: Vec<Value>) -> Self {
        Self { data, error: None }
    }

    /// A failed response.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Whether the call reported an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Client able to invoke a named stored procedure.
///
/// Implementations hold a reusable connection handle and must tolerate
/// concurrent calls and dropped (cancelled) call futures.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Invoke `procedure` with named `params`.
    async fn call(&self, procedure: &str, params: Value) -> RpcResponse;
}

// ============================================================================
// PostgREST
// ============================================================================

/// Supabase PostgREST client.
///
/// Calls `POST {url}/rest/v1/rpc/{procedure}` with the project key sent as
/// both `apikey` and bearer token.
#[derive(Clone)]
pub struct PostgrestClient {
    base_url: String,
    key: Secret,
    client: reqwest::Client,
}

impl PostgrestClient {
    /// Create a client for the project at `url`.
    pub fn new(url: impl Into<String>, key: Secret) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            key,
            client,
        })
    }

    fn endpoint(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, procedure)
    }
}

impl std::fmt::Debug for PostgrestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestClient")
            .field("base_url", &self.base_url)
            .field("key", &self.key)
            .finish()
    }
}

#[async_trait]
impl RpcClient for PostgrestClient {
    async fn call(&self, procedure: &str, params: Value) -> RpcResponse {
        debug!(procedure, "calling postgrest rpc");

        let response = match self
            .client
            .post(self.endpoint(procedure))
            .header("apikey", self.key.expose())
            .bearer_auth(self.key.expose())
            .json(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return RpcResponse::failed(format!("request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return RpcResponse::failed(format!("rpc error {status}: {error_text}"));
        }

        match response.json::<Value>().await {
            Ok(Value::Array(rows)) => RpcResponse::ok(rows),
            Ok(Value::Null) => RpcResponse::ok(Vec::new()),
            Ok(other) => RpcResponse::failed(format!(
                "expected a row array from rpc, got {}",
                json_type_name(&other)
            )),
            Err(e) => RpcResponse::failed(format!("failed to parse rpc response: {e}")),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Mock
// ============================================================================

/// A recorded mock call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    /// Procedure name.
    pub procedure: String,
    /// Parameters as sent.
    pub params: Value,
}

/// Mock RPC client that returns canned responses.
///
/// Responses are returned in order, cycling back to the first once all have
/// been used. Every call is recorded.
#[derive(Clone)]
pub struct MockRpcClient {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

struct MockState {
    canned: Vec<RpcResponse>,
    index: usize,
    calls: Vec<RpcCall>,
}

impl MockRpcClient {
    /// Create a mock with the given canned responses.
    pub fn new(responses: Vec<RpcResponse>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                canned: responses,
                index: 0,
                calls: Vec::new(),
            })),
            delay: None,
        }
    }

    /// A mock that always returns `rows`.
    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self::new(vec![RpcResponse::ok(rows)])
    }

    /// A mock that always reports `error`.
    pub fn with_error(error: impl Into<String>) -> Self {
        Self::new(vec![RpcResponse::failed(error)])
    }

    /// Wait `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far.
    pub async fn calls(&self) -> Vec<RpcCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl RpcClient for MockRpcClient {
    async fn call(&self, procedure: &str, params: Value) -> RpcResponse {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        state.calls.push(RpcCall {
            procedure: procedure.to_string(),
            params,
        });

        if state.canned.is_empty() {
            return RpcResponse::ok(Vec::new());
        }
        let response = state.canned[state.index].clone();
        state.index = (state.index + 1) % state.canned.len();
        response
    }
}
