//! CLI argument parsing and command definitions.

use clap::{Args, Parser, Subcommand};

use crate::config::ENV_REKALL_CONFIG;

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "rekall", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = ENV_REKALL_CONFIG)]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the configured vector store.
    Search(SearchArgs),

    /// Configuration operations.
    Config(ConfigCommand),

    /// Print version information.
    Version,
}

/// Arguments for `rekall search`.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Natural-language query.
    pub query: String,

    /// Number of results (defaults to the backend's default).
    #[arg(short = 'k', long = "limit")]
    pub k: Option<usize>,

    /// Namespace (partition) to search.
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Metadata filter as a JSON object, e.g. '{"source":"faq.md"}'.
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Show the resolved backend configuration, credentials masked.
    Show,
}

// ============================================================================
// Tests
// ============================================================================
