//! Backend configuration: a closed, tagged union resolved from untyped input.
//!
//! A raw payload (JSON or TOML) carries a `kind` discriminator. Resolution
//! picks exactly one variant, overlays environment overrides, applies
//! defaults, and validates required fields. Anything unknown or incomplete
//! is an [`Error::Config`].
//!
//! # Example
//!
//! ```
//! use rekall_core::MapEnv;
//! use rekall_vector::{BackendConfig, BackendKind};
//! use serde_json::json;
//!
//! let payload = json!({
//!     "kind": "supabase",
//!     "store_url": "https://abc.supabase.co",
//!     "store_key": "service-role-key",
//!     "table_name": "documents",
//!     "query_name": "match_documents",
//! });
//!
//! let config = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap();
//! assert_eq!(config.kind(), BackendKind::Supabase);
//! assert_eq!(config.embeddings_model(), "text-embedding-ada-002");
//! ```

use std::fmt;

use rekall_core::{EnvSource, Error, Result, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Embedding model used when a config does not name one.
pub const DEFAULT_EMBEDDINGS_MODEL: &str = "text-embedding-ada-002";

/// Env var overriding [`SupabaseConfig::store_url`].
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
/// Env var overriding [`SupabaseConfig::store_key`].
pub const ENV_SUPABASE_KEY: &str = "SUPABASE_KEY";
/// Env var overriding [`PineconeConfig::api_key`].
pub const ENV_PINECONE_API_KEY: &str = "PINECONE_API_KEY";
/// Env var overriding [`PineconeConfig::api_environment`].
pub const ENV_PINECONE_ENVIRONMENT: &str = "PINECONE_ENVIRONMENT";

// ============================================================================
// Discriminator
// ============================================================================

/// The closed set of backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Common fields only; no concrete store.
    Base,
    /// Pinecone index.
    Pinecone,
    /// Supabase (Postgres + pgvector) behind a PostgREST RPC.
    Supabase,
}

impl BackendKind {
    /// All kinds, in declaration order.
    pub const ALL: [BackendKind; 3] = [Self::Base, Self::Pinecone, Self::Supabase];

    /// Canonical tag string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Pinecone => "pinecone",
            Self::Supabase => "supabase",
        }
    }

    /// Parse a tag, accepting both the short and the `vector_db_` forms.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let short = tag.strip_prefix("vector_db_").unwrap_or(tag);
        Self::ALL.into_iter().find(|k| k.as_str() == short)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Variants
// ============================================================================

/// What to do with a returned row whose metadata lacks the text key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTextKeyPolicy {
    /// Drop the row, keep the rest of the batch.
    #[default]
    DropRow,
    /// Fail the whole search with a data integrity error.
    FailBatch,
}

/// Common fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Embedding model identifier.
    #[serde(default = "default_embeddings_model")]
    pub embeddings_model: String,
}

/// Pinecone index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PineconeConfig {
    /// Embedding model identifier.
    #[serde(default = "default_embeddings_model")]
    pub embeddings_model: String,

    /// Index name, or the index host URL.
    #[serde(default)]
    pub index: String,

    /// API key. Required once env overrides are applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<Secret>,

    /// Legacy pod environment (e.g. `us-west1-gcp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_environment: Option<String>,

    /// Default result count when a search does not set `k`.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Metadata key holding the page text.
    #[serde(default = "default_pinecone_text_key")]
    pub text_key: String,
}

/// Supabase RPC settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupabaseConfig {
    /// Embedding model identifier.
    #[serde(default = "default_embeddings_model")]
    pub embeddings_model: String,

    /// Project URL, e.g. `https://<ref>.supabase.co`.
    #[serde(default, alias = "supabase_url", alias = "supbase_url")]
    pub store_url: String,

    /// Service or anon key.
    #[serde(default, alias = "supabase_key", alias = "supbase_key")]
    pub store_key: Secret,

    /// Table holding the embeddings.
    #[serde(default)]
    pub table_name: String,

    /// Stored procedure performing the nearest-neighbor query.
    #[serde(default)]
    pub query_name: String,

    /// Metadata key holding the page text.
    #[serde(default = "default_supabase_text_key")]
    pub text_key: String,

    /// Policy for rows missing the text key.
    #[serde(default)]
    pub missing_text_key: MissingTextKeyPolicy,
}

fn default_embeddings_model() -> String {
    DEFAULT_EMBEDDINGS_MODEL.to_string()
}

fn default_top_k() -> usize {
    3
}

fn default_pinecone_text_key() -> String {
    "text".to_string()
}

fn default_supabase_text_key() -> String {
    "content".to_string()
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            embeddings_model: default_embeddings_model(),
        }
    }
}

impl PineconeConfig {
    /// Create a config for the given index, defaults elsewhere.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            embeddings_model: default_embeddings_model(),
            index: index.into(),
            api_key: None,
            api_environment: None,
            top_k: default_top_k(),
            text_key: default_pinecone_text_key(),
        }
    }
}

impl SupabaseConfig {
    /// Create a config with the required fields, defaults elsewhere.
    pub fn new(
        store_url: impl Into<String>,
        store_key: impl Into<Secret>,
        table_name: impl Into<String>,
        query_name: impl Into<String>,
    ) -> Self {
        Self {
            embeddings_model: default_embeddings_model(),
            store_url: store_url.into(),
            store_key: store_key.into(),
            table_name: table_name.into(),
            query_name: query_name.into(),
            text_key: default_supabase_text_key(),
            missing_text_key: MissingTextKeyPolicy::default(),
        }
    }
}

// ============================================================================
// Tagged union
// ============================================================================

/// One fully-resolved backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// See [`BaseConfig`].
    #[serde(alias = "vector_db_base")]
    Base(BaseConfig),

    /// See [`PineconeConfig`].
    #[serde(alias = "vector_db_pinecone")]
    Pinecone(PineconeConfig),

    /// See [`SupabaseConfig`].
    #[serde(alias = "vector_db_supabase")]
    Supabase(SupabaseConfig),
}

impl BackendConfig {
    /// Resolve an untyped payload into a validated config.
    ///
    /// Steps: read the `kind` tag (unknown → error), decode the variant
    /// (foreign fields → error), overlay env overrides, then validate.
    pub fn resolve(payload: &Value, env: &dyn EnvSource) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| Error::config("backend config must be a table/object"))?;

        let tag = object
            .get("kind")
            .ok_or_else(|| Error::config("backend config is missing the 'kind' field"))?
            .as_str()
            .ok_or_else(|| Error::config("backend config 'kind' must be a string"))?;

        let kind = BackendKind::from_tag(tag).ok_or_else(|| {
            Error::config(format!(
                "unknown backend kind '{tag}' (expected one of: base, pinecone, supabase)"
            ))
        })?;

        let mut normalized = object.clone();
        normalized.insert("kind".to_string(), Value::String(kind.as_str().to_string()));

        let config: Self = serde_json::from_value(Value::Object(normalized))
            .map_err(|e| Error::config(format!("invalid {kind} config: {e}")))?;

        config.with_env_overrides(env).validated()
    }

    /// Resolve a TOML document (the whole document is the payload).
    pub fn from_toml_str(source: &str, env: &dyn EnvSource) -> Result<Self> {
        let payload: Value =
            toml::from_str(source).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;
        Self::resolve(&payload, env)
    }

    /// The discriminator.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Base(_) => BackendKind::Base,
            Self::Pinecone(_) => BackendKind::Pinecone,
            Self::Supabase(_) => BackendKind::Supabase,
        }
    }

    /// The embedding model every variant carries.
    pub fn embeddings_model(&self) -> &str {
        match self {
            Self::Base(c) => &c.embeddings_model,
            Self::Pinecone(c) => &c.embeddings_model,
            Self::Supabase(c) => &c.embeddings_model,
        }
    }

    /// Apply environment overrides. An env var beats the embedded value.
    pub fn with_env_overrides(mut self, env: &dyn EnvSource) -> Self {
        match &mut self {
            Self::Base(_) => {}
            Self::Pinecone(c) => {
                if let Some(key) = env.var(ENV_PINECONE_API_KEY) {
                    c.api_key = Some(Secret::new(key));
                }
                if let Some(environment) = env.var(ENV_PINECONE_ENVIRONMENT) {
                    c.api_environment = Some(environment);
                }
            }
            Self::Supabase(c) => {
                if let Some(url) = env.var(ENV_SUPABASE_URL) {
                    c.store_url = url;
                }
                if let Some(key) = env.var(ENV_SUPABASE_KEY) {
                    c.store_key = Secret::new(key);
                }
            }
        }
        self
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<()> {
        require("embeddings_model", self.embeddings_model())?;

        match self {
            Self::Base(_) => Ok(()),
            Self::Pinecone(c) => {
                require("index", &c.index)?;
                require("text_key", &c.text_key)?;
                if c.top_k == 0 {
                    return Err(Error::config("pinecone 'top_k' must be at least 1"));
                }
                Ok(())
            }
            Self::Supabase(c) => {
                require("store_url", &c.store_url)?;
                if !(c.store_url.starts_with("https://") || c.store_url.starts_with("http://")) {
                    return Err(Error::config(format!(
                        "supabase 'store_url' must be an http(s) URL, got '{}'",
                        c.store_url
                    )));
                }
                if c.store_key.is_blank() {
                    return Err(Error::config(format!(
                        "supabase config requires 'store_key' (or {ENV_SUPABASE_KEY})"
                    )));
                }
                require("table_name", &c.table_name)?;
                require("query_name", &c.query_name)?;
                require("text_key", &c.text_key)?;
                Ok(())
            }
        }
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::config(format!(
            "required field '{field}' is missing or empty"
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use rekall_core::{ErrorKind, MapEnv};
    use serde_json::json;

    fn supabase_payload() -> Value {
        json!({
            "kind": "supabase",
            "store_url": "https://abc.supabase.co",
            "store_key": "service-key",
            "table_name": "documents",
            "query_name": "match_documents",
        })
    }

    fn assert_config_err(result: Result<BackendConfig>) {
        match result {
            Err(e) => assert_eq!(e.kind(), ErrorKind::Config, "unexpected error: {e}"),
            Ok(c) => panic!("expected config error, got {c:?}"),
        }
    }

    // ------------------------------------------------------------------------
    // BackendKind tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_backend_kind_from_tag() {
        assert_eq!(BackendKind::from_tag("supabase"), Some(BackendKind::Supabase));
        assert_eq!(
            BackendKind::from_tag("vector_db_pinecone"),
            Some(BackendKind::Pinecone)
        );
        assert_eq!(BackendKind::from_tag("base"), Some(BackendKind::Base));
        assert_eq!(BackendKind::from_tag("qdrant"), None);
        assert_eq!(BackendKind::from_tag(""), None);
    }

    // ------------------------------------------------------------------------
    // Supabase resolution tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_supabase_with_defaults() {
        let config = BackendConfig::resolve(&supabase_payload(), &MapEnv::new()).unwrap();
        assert_eq!(config.kind(), BackendKind::Supabase);
        assert_eq!(config.embeddings_model(), DEFAULT_EMBEDDINGS_MODEL);

        let BackendConfig::Supabase(c) = config else {
            panic!("expected supabase variant");
        };
        assert_eq!(c.store_url, "https://abc.supabase.co");
        assert_eq!(c.store_key.expose(), "service-key");
        assert_eq!(c.table_name, "documents");
        assert_eq!(c.query_name, "match_documents");
        assert_eq!(c.text_key, "content");
        assert_eq!(c.missing_text_key, MissingTextKeyPolicy::DropRow);
    }

    #[test]
    fn test_resolve_supabase_explicit_model() {
        let mut payload = supabase_payload();
        payload["embeddings_model"] = json!("text-embedding-3-small");
        let config = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap();
        assert_eq!(config.embeddings_model(), "text-embedding-3-small");
    }

    #[test]
    fn test_resolve_supabase_long_form_tag_and_aliases() {
        let payload = json!({
            "kind": "vector_db_supabase",
            "supbase_url": "https://abc.supabase.co",
            "supbase_key": "k",
            "table_name": "documents",
            "query_name": "match_documents",
        });
        let config = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap();
        assert_eq!(config.kind(), BackendKind::Supabase);
    }

    #[test]
    fn test_resolve_supabase_missing_required_fields() {
        for field in ["store_url", "store_key", "table_name", "query_name"] {
            let mut payload = supabase_payload();
            payload.as_object_mut().unwrap().remove(field);
            assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
        }
    }

    #[test]
    fn test_resolve_supabase_empty_required_field() {
        let mut payload = supabase_payload();
        payload["query_name"] = json!("  ");
        assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
    }

    #[test]
    fn test_resolve_supabase_bad_url() {
        let mut payload = supabase_payload();
        payload["store_url"] = json!("abc.supabase.co");
        assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
    }

    #[test]
    fn test_resolve_supabase_env_overrides_embedded_values() {
        let env = MapEnv::new()
            .with(ENV_SUPABASE_URL, "https://override.supabase.co")
            .with(ENV_SUPABASE_KEY, "env-key");
        let config = BackendConfig::resolve(&supabase_payload(), &env).unwrap();

        let BackendConfig::Supabase(c) = config else {
            panic!("expected supabase variant");
        };
        assert_eq!(c.store_url, "https://override.supabase.co");
        assert_eq!(c.store_key.expose(), "env-key");
    }

    #[test]
    fn test_resolve_supabase_env_supplies_missing_field() {
        let mut payload = supabase_payload();
        payload.as_object_mut().unwrap().remove("store_key");
        let env = MapEnv::new().with(ENV_SUPABASE_KEY, "env-key");
        assert!(BackendConfig::resolve(&payload, &env).is_ok());
    }

    #[test]
    fn test_resolve_supabase_fail_batch_policy() {
        let mut payload = supabase_payload();
        payload["missing_text_key"] = json!("fail_batch");
        payload["text_key"] = json!("body");
        let BackendConfig::Supabase(c) = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap()
        else {
            panic!("expected supabase variant");
        };
        assert_eq!(c.missing_text_key, MissingTextKeyPolicy::FailBatch);
        assert_eq!(c.text_key, "body");
    }

    // ------------------------------------------------------------------------
    // Variant-mixing and discriminator tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_rejects_mixed_variant_fields() {
        let mut payload = supabase_payload();
        payload["index"] = json!("my-index");
        assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
    }

    #[test]
    fn test_resolve_rejects_unknown_kind() {
        let payload = json!({"kind": "qdrant", "url": "http://localhost:6333"});
        let err = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("qdrant"));
    }

    #[test]
    fn test_resolve_rejects_missing_kind() {
        let payload = json!({"store_url": "https://abc.supabase.co"});
        assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
    }

    #[test]
    fn test_resolve_rejects_non_object() {
        assert_config_err(BackendConfig::resolve(&json!("supabase"), &MapEnv::new()));
    }

    // ------------------------------------------------------------------------
    // Pinecone and base resolution tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_pinecone_defaults() {
        let payload = json!({"kind": "pinecone", "index": "docs", "api_key": "pc-key"});
        let BackendConfig::Pinecone(c) = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap()
        else {
            panic!("expected pinecone variant");
        };
        assert_eq!(c.index, "docs");
        assert_eq!(c.top_k, 3);
        assert_eq!(c.text_key, "text");
        assert!(c.api_environment.is_none());
        assert_eq!(c.embeddings_model, DEFAULT_EMBEDDINGS_MODEL);
    }

    #[test]
    fn test_resolve_pinecone_key_from_env() {
        let payload = json!({"kind": "pinecone", "index": "docs"});
        let env = MapEnv::new()
            .with(ENV_PINECONE_API_KEY, "env-key")
            .with(ENV_PINECONE_ENVIRONMENT, "us-west1-gcp");
        let BackendConfig::Pinecone(c) = BackendConfig::resolve(&payload, &env).unwrap() else {
            panic!("expected pinecone variant");
        };
        assert_eq!(c.api_key.unwrap().expose(), "env-key");
        assert_eq!(c.api_environment.as_deref(), Some("us-west1-gcp"));
    }

    #[test]
    fn test_resolve_pinecone_without_key() {
        let payload = json!({"kind": "pinecone", "index": "docs"});
        let BackendConfig::Pinecone(c) = BackendConfig::resolve(&payload, &MapEnv::new()).unwrap()
        else {
            panic!("expected pinecone variant");
        };
        assert_eq!(c.index, "docs");
        assert!(c.api_key.is_none());
    }

    #[test]
    fn test_resolve_pinecone_zero_top_k() {
        let payload = json!({"kind": "pinecone", "index": "docs", "api_key": "k", "top_k": 0});
        assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
    }

    #[test]
    fn test_resolve_pinecone_missing_index() {
        let payload = json!({"kind": "pinecone", "api_key": "k"});
        assert_config_err(BackendConfig::resolve(&payload, &MapEnv::new()));
    }

    #[test]
    fn test_resolve_base() {
        let config = BackendConfig::resolve(&json!({"kind": "base"}), &MapEnv::new()).unwrap();
        assert_eq!(config, BackendConfig::Base(BaseConfig::default()));
    }

    // ------------------------------------------------------------------------
    // TOML and serialization tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_from_toml_str() {
        let source = r#"
            kind = "supabase"
            store_url = "https://abc.supabase.co"
            store_key = "k"
            table_name = "documents"
            query_name = "match_documents"
        "#;
        let config = BackendConfig::from_toml_str(source, &MapEnv::new()).unwrap();
        assert_eq!(config.kind(), BackendKind::Supabase);
    }

    #[test]
    fn test_from_toml_str_invalid() {
        assert_config_err(BackendConfig::from_toml_str("kind = ", &MapEnv::new()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BackendConfig::resolve(&supabase_payload(), &MapEnv::new()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("service-key"));
    }

    #[test]
    fn test_serialization_uses_short_tag() {
        let config = BackendConfig::Supabase(SupabaseConfig::new(
            "https://abc.supabase.co",
            "k",
            "documents",
            "match_documents",
        ));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["kind"], "supabase");
        assert_eq!(json["text_key"], "content");
    }
}
