//! Configuration for the Rekall CLI.
//!
//! Provides the [`RekallConfig`] struct that loads from a TOML file,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `REKALL_CONFIG` environment variable
//! 3. XDG default: `~/.config/rekall/config.toml`
//! 4. Built-in defaults
//!
//! # File layout
//!
//! ```toml
//! [vector_db]
//! kind = "supabase"
//! store_url = "https://abc.supabase.co"
//! table_name = "documents"
//! query_name = "match_documents"
//!
//! [embeddings]
//! provider = "openai"
//! ```
//!
//! The `[vector_db]` table is handed to [`BackendConfig::resolve`] as-is,
//! so backend env overrides (`SUPABASE_KEY`, ...) still apply.

use std::path::PathBuf;

use confyg::{env, Confygery};
use rekall_core::{EnvSource, Error, ProcessEnv, Result};
use rekall_vector::{BackendConfig, EmbeddingSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Env var naming the config file.
pub const ENV_REKALL_CONFIG: &str = "REKALL_CONFIG";

/// Keys whose values are credentials.
const SECRET_KEYS: [&str; 4] = ["store_key", "api_key", "supabase_key", "supbase_key"];

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration for the Rekall CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RekallConfig {
    /// Raw backend payload, resolved on demand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_db: Option<Value>,

    /// Embedding provider settings.
    pub embeddings: EmbeddingSettings,
}

// ============================================================================
// Config loading
// ============================================================================

impl RekallConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, &ProcessEnv)
    }

    /// Load configuration, reading `REKALL_CONFIG` from `vars`.
    pub fn load_with_env(config_path: Option<&str>, vars: &dyn EnvSource) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path, vars) {
            if path.exists() {
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            } else if config_path.is_some() {
                return Err(Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut env_opts = env::Options::with_top_level("REKALL");
        env_opts.add_section("embeddings");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;

        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::config(format!("invalid config: {e}")))
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>, env: &dyn EnvSource) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }

        if let Some(path) = env.var(ENV_REKALL_CONFIG) {
            return Some(PathBuf::from(path));
        }

        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rekall").join("config.toml"))
    }

    /// Resolve the `[vector_db]` table into a validated backend config.
    pub fn backend_config(&self, env: &dyn EnvSource) -> Result<BackendConfig> {
        let payload = self
            .vector_db
            .as_ref()
            .ok_or_else(|| Error::config("no [vector_db] table in configuration"))?;
        BackendConfig::resolve(payload, env)
    }
}

/// Render a resolved backend config as TOML with credentials masked.
pub fn redacted_toml(backend: &BackendConfig, embeddings: &EmbeddingSettings) -> Result<String> {
    let mut vector_db = serde_json::to_value(backend)?;
    redact(&mut vector_db);

    let shown = RekallConfig {
        vector_db: Some(vector_db),
        embeddings: embeddings.clone(),
    };
    toml::to_string_pretty(&shown).map_err(|e| Error::serialization(e.to_string()))
}

fn redact(value: &mut Value) {
    if let Value::Object(map) = value {
        for (key, val) in map.iter_mut() {
            if SECRET_KEYS.contains(&key.as_str()) && val.is_string() {
                *val = Value::String("***".to_string());
            } else {
                redact(val);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
