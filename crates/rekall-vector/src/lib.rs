//! Semantic retrieval over remote vector stores.
//!
//! A caller hands a natural-language query to [`RetrievalService`], which
//! embeds it, asks the configured store for its nearest neighbors, and
//! returns documents ranked by similarity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     rekall-vector                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BackendConfig (tagged union: base | pinecone | supabase)   │
//! │  └── resolve(payload, env) → validated variant              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider trait                                    │
//! │  ├── MockEmbeddingProvider (deterministic, offline)         │
//! │  ├── OpenAiEmbeddingProvider (HTTP)                         │
//! │  └── RetryingEmbeddingProvider (backoff decorator)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorStoreBackend trait                                   │
//! │  ├── SupabaseBackend ── RpcClient (PostgREST | mock)        │
//! │  └── PineconeBackend ── data-plane /query                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RetrievalService (binds one config to one backend)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure policy
//!
//! Bad config fails at construction. Bad arguments and embedding failures
//! fail the call. A failed remote query is logged and yields an empty
//! result. Malformed rows are dropped individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rekall_core::ProcessEnv;
//! use rekall_vector::{BackendConfig, MockEmbeddingProvider, RetrievalService};
//! use serde_json::json;
//!
//! # async fn run() -> rekall_core::Result<()> {
//! let config = BackendConfig::resolve(
//!     &json!({
//!         "kind": "supabase",
//!         "store_url": "https://abc.supabase.co",
//!         "store_key": "service-role-key",
//!         "table_name": "documents",
//!         "query_name": "match_documents",
//!     }),
//!     &ProcessEnv,
//! )?;
//!
//! let service = RetrievalService::new(config, Arc::new(MockEmbeddingProvider::new(1536)))?;
//! for result in service.search("refund policy", Some(2), None, None).await? {
//!     println!("{:.3} {}", result.score, result.document.content());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod embedding;
pub mod openai;
pub mod pinecone;
pub mod retry;
pub mod rpc;
pub mod service;
pub mod supabase;
pub mod types;

// Re-exports: core types
pub use types::{rank_results, Document, Metadata, ScoredResult, SearchRequest};

// Re-exports: configuration
pub use config::{
    BackendConfig, BackendKind, BaseConfig, MissingTextKeyPolicy, PineconeConfig, SupabaseConfig,
    DEFAULT_EMBEDDINGS_MODEL,
};

// Re-exports: embeddings
pub use embedding::{
    create_embedding_provider, EmbeddingProvider, EmbeddingProviderKind, EmbeddingSettings,
    MockEmbeddingProvider,
};
pub use openai::OpenAiEmbeddingProvider;
pub use retry::RetryingEmbeddingProvider;

// Re-exports: backends
pub use backend::{create_backend, VectorStoreBackend};
pub use pinecone::PineconeBackend;
pub use rpc::{MockRpcClient, PostgrestClient, RpcCall, RpcClient, RpcResponse};
pub use supabase::SupabaseBackend;

// Re-exports: service
pub use service::RetrievalService;

// Re-exports: errors
pub use rekall_core::{Error, Result};
