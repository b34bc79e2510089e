//! Command-line interface for Rekall.
//!
//! # Modules
//!
//! - [`cli`]: Argument parsing
//! - [`config`]: File/env configuration loading
//! - [`app`]: Logging setup and command dispatch

pub mod app;
pub mod cli;
pub mod config;

pub use cli::CliArgs;
pub use config::RekallConfig;
