use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scans
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// A running mission untouched for this long is considered stalled
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,
    /// Requeue failed missions that still have retries left
    #[serde(default = "default_true")]
    pub auto_recover_failed: bool,
    /// Upper bound on recoveries performed by a single scan
    #[serde(default = "default_max_auto_recoveries")]
    pub max_auto_recoveries: u32,
}

fn default_true() -> bool {
    true
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_stale_threshold_secs() -> u64 {
    300
}
fn default_max_auto_recoveries() -> u32 {
    3
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval_secs(),
            stale_threshold_secs: default_stale_threshold_secs(),
            auto_recover_failed: true,
            max_auto_recoveries: default_max_auto_recoveries(),
        }
    }
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }
}
