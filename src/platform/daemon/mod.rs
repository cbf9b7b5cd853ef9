use crate::config::Config;
use crate::mission::{MissionStore, SqliteMissionStore};
use crate::platform::alerts;
use crate::platform::watchdog::{MissionWatchdog, ScanReport};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

mod state;

use state::spawn_state_writer;

const STATUS_FLUSH_SECONDS: u64 = 5;

/// Hosts the watchdog until Ctrl-C, or performs a single scan and prints
/// its report when `once` is set.
pub async fn run(config: Arc<Config>, once: bool) -> Result<()> {
    if once {
        let report = scan_once(&config).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    run_until(config, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl-C");
        }
    })
    .await
}

/// Runs one watchdog scan against the configured store.
///
/// A fresh watchdog has no previous scan to compare against, so the report
/// never lists stalls; only failed-mission recovery takes effect.
pub async fn scan_once(config: &Config) -> Result<ScanReport> {
    let store = open_store(config).await?;
    build_watchdog(config, store).scan().await
}

/// Hosts the watchdog and the status writer until `shutdown` resolves.
pub async fn run_until<F>(config: Arc<Config>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let store = open_store(&config).await?;
    let watchdog = Arc::new(build_watchdog(&config, store.clone()));

    if config.watchdog.enabled {
        watchdog.start();
    } else {
        tracing::warn!("watchdog disabled in config; only the status file is maintained");
    }
    let state_writer = spawn_state_writer(Arc::clone(&config), store, Arc::clone(&watchdog));

    println!("◆ missiond started");
    println!("   workspace: {}", config.workspace_dir.display());
    println!("   status:    {}", state_file_path(&config).display());
    println!("   Ctrl+C to stop");

    shutdown.await;
    tracing::info!("shutdown requested");

    watchdog.stop().await;
    state_writer.abort();
    let _ = state_writer.await;
    Ok(())
}

pub fn state_file_path(config: &Config) -> PathBuf {
    state::state_file_path(config)
}

async fn open_store(config: &Config) -> Result<Arc<SqliteMissionStore>> {
    let store = SqliteMissionStore::open_in_workspace(&config.workspace_dir)
        .await
        .with_context(|| {
            format!(
                "failed to open mission store in {}",
                config.workspace_dir.display()
            )
        })?;
    Ok(Arc::new(store))
}

fn build_watchdog(config: &Config, store: Arc<dyn MissionStore>) -> MissionWatchdog {
    MissionWatchdog::new(store, config.watchdog.clone())
        .with_alerts(alerts::from_config(&config.alerts))
}
