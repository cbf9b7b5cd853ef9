use super::state::MissionState;
use crate::config::SchedulerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A supervised unit of long-running, possibly recurring work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: String,
    pub title: String,
    pub goal: String,
    pub state: MissionState,
    /// `None` runs once; a positive interval re-runs after each full cycle.
    pub schedule_interval_secs: Option<u64>,
    pub retry_limit: u32,
    pub retry_count: u32,
    pub max_concurrency: u32,
    /// Opaque payload for the planner/executor.
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Mission {
    pub fn is_recurring(&self) -> bool {
        self.schedule_interval_secs.is_some_and(|secs| secs > 0)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn schedule_interval(&self) -> Option<Duration> {
        self.schedule_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retry_limit.saturating_sub(self.retry_count)
    }
}

/// Append-only audit record, written once per accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionEvent {
    pub id: i64,
    pub mission_id: String,
    pub from_state: MissionState,
    pub to_state: MissionState,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMission {
    pub title: String,
    pub goal: String,
    pub schedule_interval_secs: Option<u64>,
    pub retry_limit: u32,
    pub max_concurrency: u32,
    pub context: serde_json::Value,
}

impl NewMission {
    pub fn new(title: impl Into<String>, goal: impl Into<String>) -> Self {
        Self::with_defaults(title, goal, &SchedulerConfig::default())
    }

    /// Takes retry limit and concurrency from the `[scheduler]` defaults.
    pub fn with_defaults(
        title: impl Into<String>,
        goal: impl Into<String>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            title: title.into(),
            goal: goal.into(),
            schedule_interval_secs: None,
            retry_limit: config.default_retry_limit,
            max_concurrency: config.default_max_concurrency,
            context: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

impl Default for NewMission {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}
