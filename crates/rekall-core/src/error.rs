//! Error types for Rekall operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all Rekall crates. Uses `thiserror` for derive macros.
//!
//! # Fatal vs. soft failures
//!
//! Most variants abort the operation that raised them. [`Error::RemoteQuery`]
//! and [`Error::DataIntegrity`] are the two soft variants: backends log them
//! and degrade (to an empty result, or by dropping a single row) instead of
//! returning them to the caller.

use std::fmt;

use thiserror::Error;

/// Why an embedding request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EmbeddingFailure {
    /// The provider throttled the request.
    RateLimited {
        /// Seconds the provider asked us to wait, if it said.
        retry_after_secs: Option<u64>,
    },

    /// The provider could not be reached (connect failure, timeout, 5xx).
    Unreachable,

    /// The configured embeddings model is not served by the provider.
    InvalidModel,

    /// Anything else (malformed response, auth failure, ...).
    Other,
}

impl fmt::Display for EmbeddingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "rate limited (retry after {secs}s)"),
            Self::RateLimited {
                retry_after_secs: None,
            } => write!(f, "rate limited"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::InvalidModel => write!(f, "invalid model"),
            Self::Other => write!(f, "failed"),
        }
    }
}

/// Errors that can occur in Rekall operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Bad or incomplete backend configuration. Fatal at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad call arguments (empty query, `k == 0`, ...). Fatal per call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The embedding step failed. Fatal per call.
    #[error("Embedding {failure}: {message}")]
    Embedding {
        /// Failure class reported by the provider.
        failure: EmbeddingFailure,
        /// Provider-supplied detail.
        message: String,
    },

    /// The remote similarity query failed. Soft: degrades to empty results.
    #[error("Remote query error: {0}")]
    RemoteQuery(String),

    /// A single returned row is malformed. Soft: the row is dropped.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// The bound backend does not support the requested filter or namespace.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification of an [`Error`], handy for matching in callers
/// and for structured log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::Config`].
    Config,
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::Embedding`].
    Embedding,
    /// See [`Error::RemoteQuery`].
    RemoteQuery,
    /// See [`Error::DataIntegrity`].
    DataIntegrity,
    /// See [`Error::Unsupported`].
    Unsupported,
    /// I/O, serialization, or transport plumbing.
    Internal,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an embedding error of the given failure class.
    pub fn embedding(failure: EmbeddingFailure, msg: impl Into<String>) -> Self {
        Self::Embedding {
            failure,
            message: msg.into(),
        }
    }

    /// Create a remote query error.
    pub fn remote_query(msg: impl Into<String>) -> Self {
        Self::RemoteQuery(msg.into())
    }

    /// Create a data integrity error.
    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Embedding { .. } => ErrorKind::Embedding,
            Self::RemoteQuery(_) => ErrorKind::RemoteQuery,
            Self::DataIntegrity(_) => ErrorKind::DataIntegrity,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Io(_) | Self::Serialization(_) | Self::Http(_) => ErrorKind::Internal,
        }
    }

    /// The embedding failure class, if this is an embedding error.
    pub fn embedding_failure(&self) -> Option<EmbeddingFailure> {
        match self {
            Self::Embedding { failure, .. } => Some(*failure),
            _ => None,
        }
    }

    /// Whether this error aborts the operation that raised it.
    ///
    /// Only remote-query failures are soft: backends log them and return an
    /// empty result. A [`Error::DataIntegrity`] that reaches the caller has
    /// already failed the batch; dropped rows never surface as errors.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RemoteQuery(_))
    }

    /// Whether a provider-side retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Embedding {
                failure: EmbeddingFailure::RateLimited { .. } | EmbeddingFailure::Unreachable,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type alias using Rekall's Error type.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================
