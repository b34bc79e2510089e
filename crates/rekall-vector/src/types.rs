//! Common types for the retrieval layer.
//!
//! These types are shared by every backend and by the service facade.

use rekall_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document metadata: string keys mapping to JSON scalars or strings.
pub type Metadata = Map<String, Value>;

// ============================================================================
// Documents
// ============================================================================

/// A retrieved document: page text plus metadata.
///
/// Immutable once constructed. The text key has already been promoted out
/// of `metadata` into `content`, so the two never duplicate each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    content: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Metadata,
}

impl Document {
    /// Create a document.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Build a document from a raw metadata mapping by popping `text_key`
    /// out of it and promoting it to `content`.
    ///
    /// Fails with [`Error::DataIntegrity`] when the key is absent or does
    /// not hold a string.
    pub fn from_metadata(mut metadata: Metadata, text_key: &str) -> Result<Self> {
        match metadata.remove(text_key) {
            Some(Value::String(content)) => Ok(Self { content, metadata }),
            Some(other) => Err(Error::data_integrity(format!(
                "text key '{text_key}' holds a non-string value: {other}"
            ))),
            None => Err(Error::data_integrity(format!(
                "metadata is missing text key '{text_key}'"
            ))),
        }
    }

    /// The page text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The remaining metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Look up a metadata value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Decompose into `(content, metadata)`.
    pub fn into_parts(self) -> (String, Metadata) {
        (self.content, self.metadata)
    }
}

/// A document paired with a backend-defined similarity score.
///
/// Higher is more similar. Scores are only comparable within a single
/// search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    /// The matched document.
    pub document: Document,

    /// Similarity score.
    pub score: f64,
}

impl ScoredResult {
    /// Pair a document with its score.
    pub fn new(document: Document, score: f64) -> Self {
        Self { document, score }
    }
}

// ============================================================================
// Search request
// ============================================================================

/// Parameters for a similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Natural-language query (will be embedded).
    pub query: String,

    /// Desired result count. `None` uses the backend default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,

    /// Backend-specific metadata predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Metadata>,

    /// Partition to search. `None` uses the backend's default partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SearchRequest {
    /// Create a request for the given query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set the desired result count.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Set the metadata filter.
    pub fn with_filter(mut self, filter: Metadata) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add one equality condition to the metadata filter.
    pub fn with_filter_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Check the call arguments.
    ///
    /// An empty (or whitespace-only) query and `k == 0` are rejected.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::validation("query must not be empty"));
        }
        if self.k == Some(0) {
            return Err(Error::validation("k must be at least 1"));
        }
        Ok(())
    }

    /// The result count to use, falling back to `default_k`.
    pub fn effective_k(&self, default_k: usize) -> usize {
        self.k.unwrap_or(default_k).max(1)
    }

    /// The filter, if present and non-empty.
    pub fn active_filter(&self) -> Option<&Metadata> {
        self.filter.as_ref().filter(|f| !f.is_empty())
    }

    /// The namespace, if present and non-empty.
    pub fn active_namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// Order results by score descending and keep at most `k`.
///
/// The sort is stable, so ties keep the order the remote store returned.
pub fn rank_results(mut results: Vec<ScoredResult>, k: usize) -> Vec<ScoredResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(k);
    results
}

// ============================================================================
// Tests
// ============================================================================
