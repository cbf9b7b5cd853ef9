use crate::platform::scheduler::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Retries granted to missions created without an explicit limit
    #[serde(default = "default_retry_limit")]
    pub default_retry_limit: u32,
    #[serde(default = "default_max_concurrency")]
    pub default_max_concurrency: u32,
    /// Delay before the first retry; doubles per consecutive failure
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: f64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: f64,
    /// Multiplicative jitter, drawn from [1 - j, 1 + j]
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
    #[serde(default = "default_min_backoff_secs")]
    pub min_backoff_secs: f64,
}

fn default_retry_limit() -> u32 {
    3
}
fn default_max_concurrency() -> u32 {
    1
}
fn default_base_backoff_secs() -> f64 {
    2.0
}
fn default_max_backoff_secs() -> f64 {
    300.0
}
fn default_jitter_fraction() -> f64 {
    0.25
}
fn default_min_backoff_secs() -> f64 {
    0.1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_retry_limit: default_retry_limit(),
            default_max_concurrency: default_max_concurrency(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            jitter_fraction: default_jitter_fraction(),
            min_backoff_secs: default_min_backoff_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: secs(self.base_backoff_secs),
            max: secs(self.max_backoff_secs),
            jitter_fraction: self.jitter_fraction,
            floor: secs(self.min_backoff_secs),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}
