use crate::config::Config;
use crate::mission::SqliteMissionStore;
use crate::platform::watchdog::MissionWatchdog;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Debug, Clone, serde::Serialize)]
pub(super) struct DaemonStatus {
    watchdog_running: bool,
    /// Mission count per state; `null` when the store could not be read.
    missions: Option<BTreeMap<String, usize>>,
    written_at: String,
}

pub(super) fn state_file_path(config: &Config) -> PathBuf {
    config
        .config_path
        .parent()
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join("daemon_state.json")
}

pub(super) async fn collect_status(
    store: &SqliteMissionStore,
    watchdog: &MissionWatchdog,
) -> DaemonStatus {
    let missions = match store.list_all_missions().await {
        Ok(missions) => {
            let mut counts = BTreeMap::new();
            for mission in missions {
                *counts.entry(mission.state.to_string()).or_insert(0) += 1;
            }
            Some(counts)
        }
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "failed to count missions");
            None
        }
    };

    DaemonStatus {
        watchdog_running: watchdog.is_running(),
        missions,
        written_at: Utc::now().to_rfc3339(),
    }
}

pub(super) fn spawn_state_writer(
    config: Arc<Config>,
    store: Arc<SqliteMissionStore>,
    watchdog: Arc<MissionWatchdog>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = state_file_path(&config);
        if let Some(parent) = path.parent()
            && let Err(error) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(%error, "failed to create state file directory");
        }

        let mut interval = tokio::time::interval(Duration::from_secs(super::STATUS_FLUSH_SECONDS));
        loop {
            interval.tick().await;
            let status = collect_status(&store, &watchdog).await;
            let data = serde_json::to_vec_pretty(&status).unwrap_or_else(|_| b"{}".to_vec());
            if let Err(error) = tokio::fs::write(&path, data).await {
                tracing::warn!(%error, "failed to write daemon state file");
            }
        }
    })
}
