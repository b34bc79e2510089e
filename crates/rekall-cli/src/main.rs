//! The `rekall` binary.

use clap::Parser;
use rekall_cli::{app, CliArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    app::run(args).await?;
    Ok(())
}
