use crate::error::BudgetBreach;
use crate::platform::alerts::{self, AlertKind, AlertSink};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Limits for a single mission run. `None` leaves a dimension unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetConfig {
    pub max_time: Option<Duration>,
    pub max_actions: Option<u64>,
    pub max_cost_usd: Option<f64>,
}

/// Usage counters for one tracked mission run.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetUsage {
    pub mission_id: String,
    pub elapsed: Duration,
    pub actions: u64,
    pub cost_usd: f64,
    pub started: Instant,
    pub breached: bool,
    pub breach_reason: Option<String>,
}

impl BudgetUsage {
    fn new(mission_id: &str) -> Self {
        Self {
            mission_id: mission_id.to_string(),
            elapsed: Duration::ZERO,
            actions: 0,
            cost_usd: 0.0,
            started: Instant::now(),
            breached: false,
            breach_reason: None,
        }
    }

    fn refresh_elapsed(&mut self) {
        self.elapsed = self.started.elapsed();
    }

    /// First configured limit that is met or exceeded, checked in
    /// time, action, cost order.
    fn first_breach(&self, config: &BudgetConfig) -> Option<String> {
        if let Some(max_time) = config.max_time
            && self.elapsed >= max_time
        {
            return Some(format!(
                "time budget exceeded ({:.1}s / {:.1}s)",
                self.elapsed.as_secs_f64(),
                max_time.as_secs_f64()
            ));
        }
        if let Some(max_actions) = config.max_actions
            && self.actions >= max_actions
        {
            return Some(format!(
                "action budget exceeded ({} / {max_actions})",
                self.actions
            ));
        }
        if let Some(max_cost) = config.max_cost_usd
            && self.cost_usd >= max_cost
        {
            return Some(format!(
                "cost budget exceeded (${:.4} / ${max_cost:.4})",
                self.cost_usd
            ));
        }
        None
    }
}

/// Observability snapshot of a tracked run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub mission_id: String,
    pub elapsed_secs: f64,
    pub actions: u64,
    pub cost_usd: f64,
    pub breached: bool,
    pub breach_reason: Option<String>,
    pub limits: BudgetLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetLimits {
    pub max_time_secs: Option<f64>,
    pub max_actions: Option<u64>,
    pub max_cost_usd: Option<f64>,
}

struct Tracked {
    config: BudgetConfig,
    usage: BudgetUsage,
}

/// Tracks time, action and cost budgets per mission run.
///
/// State is process-local: a restart starts every budget from zero.
pub struct BudgetEnforcer {
    tracked: Mutex<HashMap<String, Tracked>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl BudgetEnforcer {
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
            alerts: None,
        }
    }

    pub fn with_alerts(alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
            alerts: Some(alerts),
        }
    }

    /// Begins tracking a fresh run, replacing any previous counters.
    pub fn start(&self, mission_id: &str, config: BudgetConfig) -> BudgetUsage {
        let usage = BudgetUsage::new(mission_id);
        self.lock().insert(
            mission_id.to_string(),
            Tracked {
                config,
                usage: usage.clone(),
            },
        );
        usage
    }

    pub fn stop(&self, mission_id: &str) {
        self.lock().remove(mission_id);
    }

    /// Counts one action and its cost. Untracked missions are ignored.
    pub fn record_action(&self, mission_id: &str, cost_usd: f64) {
        if let Some(tracked) = self.lock().get_mut(mission_id) {
            tracked.usage.actions = tracked.usage.actions.saturating_add(1);
            tracked.usage.cost_usd += cost_usd;
            tracked.usage.refresh_elapsed();
        }
    }

    /// Fails on the first call that finds a configured limit met or
    /// exceeded. Later calls for the same run return `Ok(())`.
    pub async fn check(&self, mission_id: &str) -> Result<(), BudgetBreach> {
        let reason = {
            let mut tracked = self.lock();
            let Some(entry) = tracked.get_mut(mission_id) else {
                return Ok(());
            };
            entry.usage.refresh_elapsed();
            if entry.usage.breached {
                return Ok(());
            }
            let Some(reason) = entry.usage.first_breach(&entry.config) else {
                return Ok(());
            };
            entry.usage.breached = true;
            entry.usage.breach_reason = Some(reason.clone());
            reason
        };

        tracing::warn!(mission_id, reason = %reason, "budget breach");
        alerts::notify(self.alerts.as_ref(), mission_id, AlertKind::BudgetBreach, &reason).await;
        Err(BudgetBreach {
            mission_id: mission_id.to_string(),
            reason,
        })
    }

    pub fn usage(&self, mission_id: &str) -> Option<BudgetUsage> {
        self.lock().get(mission_id).map(|t| t.usage.clone())
    }

    pub fn summary(&self, mission_id: &str) -> Option<BudgetSummary> {
        let tracked = self.lock();
        let entry = tracked.get(mission_id)?;
        Some(BudgetSummary {
            mission_id: mission_id.to_string(),
            elapsed_secs: (entry.usage.elapsed.as_secs_f64() * 100.0).round() / 100.0,
            actions: entry.usage.actions,
            cost_usd: entry.usage.cost_usd,
            breached: entry.usage.breached,
            breach_reason: entry.usage.breach_reason.clone(),
            limits: BudgetLimits {
                max_time_secs: entry.config.max_time.map(|d| d.as_secs_f64()),
                max_actions: entry.config.max_actions,
                max_cost_usd: entry.config.max_cost_usd,
            },
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Tracked>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
