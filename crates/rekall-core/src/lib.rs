//! Rekall Core: shared errors, secrets, and environment abstractions.
//!
//! This crate provides the foundational types used across all Rekall crates.
//! It has no internal Rekall dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`env`]: Injectable environment lookup
//! - [`secret`]: Redacting credential wrapper

pub mod env;
pub mod error;
pub mod secret;

// Re-export key types at crate root for convenience
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{EmbeddingFailure, Error, ErrorKind, Result};
pub use secret::Secret;
