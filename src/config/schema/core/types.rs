use super::super::{
    AlertsConfig, BudgetDefaults, ObservabilityConfig, SchedulerConfig, WatchdogConfig,
};
use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper limit for `scheduler.max_backoff_secs` (one day).
pub const MAX_BACKOFF_CEILING_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub watchdog: WatchdogConfig,

    #[serde(default)]
    pub budget: BudgetDefaults,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let missiond_dir = home.join(".missiond");

        Self {
            workspace_dir: missiond_dir.join("workspace"),
            config_path: missiond_dir.join("config.toml"),
            scheduler: SchedulerConfig::default(),
            watchdog: WatchdogConfig::default(),
            budget: BudgetDefaults::default(),
            alerts: AlertsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog.poll_interval_secs == 0 {
            return Err(invalid("watchdog.poll_interval_secs must be > 0"));
        }
        if self.watchdog.stale_threshold_secs == 0 {
            return Err(invalid("watchdog.stale_threshold_secs must be > 0"));
        }

        let scheduler = &self.scheduler;
        if !(0.0..1.0).contains(&scheduler.jitter_fraction) {
            return Err(invalid("scheduler.jitter_fraction must be in [0.0, 1.0)"));
        }
        if scheduler.base_backoff_secs.is_nan() || scheduler.base_backoff_secs <= 0.0 {
            return Err(invalid("scheduler.base_backoff_secs must be > 0"));
        }
        if scheduler.max_backoff_secs.is_nan()
            || scheduler.max_backoff_secs < scheduler.base_backoff_secs
        {
            return Err(invalid(
                "scheduler.max_backoff_secs must be >= scheduler.base_backoff_secs",
            ));
        }
        if scheduler.max_backoff_secs > MAX_BACKOFF_CEILING_SECS {
            return Err(invalid("scheduler.max_backoff_secs must be <= 86400"));
        }

        if let Some(cost) = self.budget.max_cost_usd
            && (cost.is_nan() || cost < 0.0)
        {
            return Err(invalid("budget.max_cost_usd must be >= 0"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}
