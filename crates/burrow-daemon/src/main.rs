//! Burrow Daemon
//!
//! Background process that keeps the content index of the configured
//! directories current.

mod daemon;
mod signals;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use daemon::Daemon;

/// Burrow indexing daemon
#[derive(Parser)]
#[command(name = "burrowd")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.burrow/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let daemon = Daemon::new(cli.config.as_deref())?;

    // Initialize logging; RUST_LOG overrides the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&daemon.config().log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting burrow daemon v{}", env!("CARGO_PKG_VERSION"));

    // Run async runtime
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(daemon.run())
}
