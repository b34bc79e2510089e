//! Environment lookup as an injected capability.
//!
//! Configuration resolution never reads `std::env` directly; it asks an
//! [`EnvSource`]. Production code passes [`ProcessEnv`], tests pass a
//! [`MapEnv`] so that overrides are deterministic.

use std::collections::HashMap;

/// A source of environment-style key/value settings.
///
/// # Example
///
/// ```
/// use rekall_core::env::{EnvSource, MapEnv};
///
/// let env = MapEnv::new().with("SUPABASE_URL", "https://db.example.co");
/// assert_eq!(env.var("SUPABASE_URL").as_deref(), Some("https://db.example.co"));
/// assert!(env.var("SUPABASE_KEY").is_none());
/// ```
pub trait EnvSource: Send + Sync {
    /// Look up a variable. Empty values are treated as unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// An in-memory environment, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

impl<T: EnvSource + ?Sized> EnvSource for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}
