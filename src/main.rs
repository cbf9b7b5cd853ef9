#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::{Context, Result};
use clap::Parser;
use missiond::Config;
use missiond::platform::daemon;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

/// Mission supervision daemon: hosts the stall watchdog over the mission store.
#[derive(Debug, Parser)]
#[command(name = "missiond", version, about)]
struct Cli {
    /// Config file to use instead of ~/.missiond/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run a single watchdog scan, print the report as JSON and exit.
    /// Only failed-mission recovery applies; stalls need two scans of a
    /// running daemon
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init()?,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.observability.tracing_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    daemon::run(Arc::new(config), cli.once).await
}
