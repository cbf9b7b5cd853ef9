use crate::config::WatchdogConfig;
use crate::mission::{Mission, MissionState, MissionStore};
use crate::platform::alerts::{self, AlertKind, AlertSink};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// What a single watchdog scan observed and changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub running_checked: usize,
    /// Missions forced from `running` to `failed`.
    pub stalled: Vec<String>,
    pub failed_checked: usize,
    /// Missions requeued from `failed` to `idle`.
    pub recovered: Vec<String>,
}

/// Periodic stall detection and auto-recovery over the mission store.
///
/// The watchdog only flips persisted state; re-supervising requeued
/// missions is the dispatcher's job.
pub struct MissionWatchdog {
    store: Arc<dyn MissionStore>,
    config: WatchdogConfig,
    alerts: Option<Arc<dyn AlertSink>>,
    /// `updated_at` of each running mission as of the previous scan.
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl MissionWatchdog {
    pub fn new(store: Arc<dyn MissionStore>, config: WatchdogConfig) -> Self {
        Self {
            store,
            config,
            alerts: None,
            last_seen: Mutex::new(HashMap::new()),
            task: Mutex::new(None),
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Spawns the scan loop. Returns `false` if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let watchdog = Arc::clone(self);
        let handle = tokio::spawn(watchdog.run(cancel.clone()));
        *task = Some((cancel, handle));
        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            stale_threshold_secs = self.config.stale_threshold_secs,
            "mission watchdog started"
        );
        true
    }

    /// Stops the scan loop, letting an in-progress scan finish. Returns
    /// `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some((cancel, handle)) = lock(&self.task).take() else {
            return false;
        };
        cancel.cancel();
        if let Err(error) = handle.await {
            tracing::warn!(%error, "mission watchdog task ended abnormally");
        }
        tracing::info!("mission watchdog stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.config.poll_interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.scan().await {
                Ok(report) => tracing::debug!(
                    running = report.running_checked,
                    stalled = report.stalled.len(),
                    failed = report.failed_checked,
                    recovered = report.recovered.len(),
                    "watchdog scan complete"
                ),
                Err(error) => {
                    tracing::warn!(error = %format!("{error:#}"), "watchdog scan failed");
                }
            }
        }
    }

    /// Runs one stall-detection pass followed by one recovery pass.
    pub async fn scan(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        self.detect_stalls(&mut report).await?;
        if self.config.auto_recover_failed {
            self.recover_failed(&mut report).await?;
        }
        Ok(report)
    }

    async fn detect_stalls(&self, report: &mut ScanReport) -> Result<()> {
        let running = self
            .store
            .list_missions(MissionState::Running)
            .await
            .context("failed to list running missions")?;
        report.running_checked = running.len();

        let now = Utc::now();
        let threshold =
            TimeDelta::from_std(self.config.stale_threshold()).unwrap_or(TimeDelta::MAX);

        let stale: Vec<(&Mission, i64)> = {
            let mut seen = lock(&self.last_seen);
            let running_ids: HashSet<&str> =
                running.iter().map(|m| m.mission_id.as_str()).collect();
            seen.retain(|id, _| running_ids.contains(id.as_str()));

            running
                .iter()
                .filter_map(|mission| {
                    let age = now - mission.updated_at;
                    let unchanged = seen.get(&mission.mission_id) == Some(&mission.updated_at);
                    if unchanged && age >= threshold {
                        Some((mission, age.num_seconds()))
                    } else {
                        seen.insert(mission.mission_id.clone(), mission.updated_at);
                        None
                    }
                })
                .collect()
        };

        for (mission, age_secs) in stale {
            let mission_id = mission.mission_id.as_str();
            let reason = format!("watchdog: stalled for {age_secs}s");
            match self
                .store
                .transition_mission(mission_id, MissionState::Failed, &reason)
                .await
            {
                Ok(_) => {
                    lock(&self.last_seen).remove(mission_id);
                    tracing::warn!(mission_id, age_secs, "stalled mission marked failed");
                    alerts::notify(
                        self.alerts.as_ref(),
                        mission_id,
                        AlertKind::WatchdogStalled,
                        &format!("stalled {age_secs}s"),
                    )
                    .await;
                    report.stalled.push(mission_id.to_string());
                }
                Err(error) => {
                    tracing::warn!(
                        mission_id,
                        error = %format!("{error:#}"),
                        "failed to mark stalled mission"
                    );
                }
            }
        }
        Ok(())
    }

    async fn recover_failed(&self, report: &mut ScanReport) -> Result<()> {
        let failed = self
            .store
            .list_missions(MissionState::Failed)
            .await
            .context("failed to list failed missions")?;
        report.failed_checked = failed.len();

        let cap = usize::try_from(self.config.max_auto_recoveries).unwrap_or(usize::MAX);
        for mission in failed.iter().filter(|m| m.retry_count < m.retry_limit) {
            if report.recovered.len() >= cap {
                tracing::debug!(cap, "auto-recovery cap reached for this scan");
                break;
            }

            let mission_id = mission.mission_id.as_str();
            let attempt = mission.retry_count.saturating_add(1);
            let reason = format!(
                "watchdog: auto-recovery attempt {attempt}/{}",
                mission.retry_limit
            );
            if let Err(error) = self
                .store
                .transition_mission(mission_id, MissionState::Idle, &reason)
                .await
            {
                tracing::warn!(
                    mission_id,
                    error = %format!("{error:#}"),
                    "failed to requeue mission"
                );
                continue;
            }
            if let Err(error) = self.store.increment_mission_retry(mission_id).await {
                tracing::warn!(
                    mission_id,
                    error = %format!("{error:#}"),
                    "failed to bump retry count"
                );
            }

            tracing::info!(
                mission_id,
                attempt,
                retry_limit = mission.retry_limit,
                "failed mission requeued"
            );
            alerts::notify(
                self.alerts.as_ref(),
                mission_id,
                AlertKind::WatchdogRecovered,
                &format!("retry {attempt}/{}", mission.retry_limit),
            )
            .await;
            report.recovered.push(mission_id.to_string());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
