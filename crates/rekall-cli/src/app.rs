//! Command dispatch for the `rekall` binary.

use rekall_core::{EnvSource, Error, ProcessEnv, Result};
use rekall_vector::{create_embedding_provider, Metadata, RetrievalService, ScoredResult};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command, ConfigAction, SearchArgs};
use crate::config::{redacted_toml, RekallConfig};

/// Initialise tracing-based logging.
///
/// Uses `RUST_LOG` env var if set, otherwise defaults based on verbosity flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Ignore error if a subscriber is already set (e.g. in tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI with the given arguments.
pub async fn run(args: CliArgs) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    match args.command {
        Some(Command::Search(search)) => {
            let config = RekallConfig::load(args.config.as_deref())?;
            let results = execute_search(&config, &search, &ProcessEnv).await?;
            print!("{}", format_results(&results, search.json)?);
            Ok(())
        }
        Some(Command::Config(cmd)) => match cmd.command {
            ConfigAction::Path => {
                match RekallConfig::resolve_config_path(args.config.as_deref(), &ProcessEnv) {
                    Some(path) => println!("{}", path.display()),
                    None => println!("(no config path could be determined)"),
                }
                Ok(())
            }
            ConfigAction::Show => {
                let config = RekallConfig::load(args.config.as_deref())?;
                let backend = config.backend_config(&ProcessEnv)?;
                print!("{}", redacted_toml(&backend, &config.embeddings)?);
                Ok(())
            }
        },
        Some(Command::Version) => {
            println!("rekall {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            println!("rekall {}, use --help for usage", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Resolve config, build the service, and run one search.
pub async fn execute_search(
    config: &RekallConfig,
    args: &SearchArgs,
    env: &dyn EnvSource,
) -> Result<Vec<ScoredResult>> {
    let backend = config.backend_config(env)?;
    let filter = args.filter.as_deref().map(parse_filter).transpose()?;

    let embedder =
        create_embedding_provider(&config.embeddings, backend.embeddings_model(), env)?;
    debug!(embedder = embedder.name(), model = embedder.model(), "embedding provider ready");

    let service = RetrievalService::new(backend, embedder)?;
    service
        .search(&args.query, args.k, filter, args.namespace.as_deref())
        .await
}

/// Parse a `--filter` argument. It must be a JSON object.
pub fn parse_filter(raw: &str) -> Result<Metadata> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::validation("--filter must be a JSON object")),
        Err(e) => Err(Error::validation(format!("--filter is not valid JSON: {e}"))),
    }
}

/// Render results as numbered lines or as JSON.
pub fn format_results(results: &[ScoredResult], json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(results)?;
        out.push('\n');
        return Ok(out);
    }

    if results.is_empty() {
        return Ok("No results.\n".to_string());
    }

    let mut out = String::new();
    for (rank, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {:.4}  {}\n",
            rank + 1,
            result.score,
            result.document.content()
        ));
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
