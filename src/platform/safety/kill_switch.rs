use crate::platform::alerts::{self, AlertKind, AlertSink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_KILL_REASON: &str = "kill switch triggered";

#[derive(Default)]
struct KillState {
    reasons: HashMap<String, String>,
    signals: HashMap<String, CancellationToken>,
}

/// Emergency stop for running missions.
///
/// The execution loop polls [`KillSwitch::is_killed`] before each step;
/// supervisory tasks can instead race their work against
/// [`KillSwitch::wait_for_kill`].
pub struct KillSwitch {
    state: Mutex<KillState>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KillState::default()),
            alerts: None,
        }
    }

    pub fn with_alerts(alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            state: Mutex::new(KillState::default()),
            alerts: Some(alerts),
        }
    }

    /// Prepares the wait-able signal for a run. Call before the run starts.
    pub fn arm(&self, mission_id: &str) {
        let mut state = self.lock();
        let token = CancellationToken::new();
        if state.reasons.contains_key(mission_id) {
            token.cancel();
        }
        if let Some(previous) = state.signals.insert(mission_id.to_string(), token) {
            previous.cancel();
        }
    }

    /// Clears tracking after a run concludes. Pending waiters are released
    /// with `None`.
    pub fn disarm(&self, mission_id: &str) {
        let signal = {
            let mut state = self.lock();
            state.reasons.remove(mission_id);
            state.signals.remove(mission_id)
        };
        if let Some(signal) = signal {
            signal.cancel();
        }
    }

    pub async fn trigger(&self, mission_id: &str, reason: &str) {
        let signal = {
            let mut state = self.lock();
            state
                .reasons
                .insert(mission_id.to_string(), reason.to_string());
            state.signals.get(mission_id).cloned()
        };
        if let Some(signal) = signal {
            signal.cancel();
        }
        tracing::warn!(mission_id, reason, "kill switch triggered");
        alerts::notify(
            self.alerts.as_ref(),
            mission_id,
            AlertKind::KillSwitchTriggered,
            reason,
        )
        .await;
    }

    pub fn is_killed(&self, mission_id: &str) -> bool {
        self.lock().reasons.contains_key(mission_id)
    }

    pub fn kill_reason(&self, mission_id: &str) -> Option<String> {
        self.lock().reasons.get(mission_id).cloned()
    }

    /// Waits until the mission is killed and returns the reason.
    ///
    /// Returns immediately for a mission that is not armed, and yields
    /// `None` when the mission is disarmed without being killed.
    pub async fn wait_for_kill(&self, mission_id: &str) -> Option<String> {
        let signal = self.lock().signals.get(mission_id).cloned();
        if let Some(signal) = signal {
            signal.cancelled().await;
        }
        self.kill_reason(mission_id)
    }

    /// Ids of all currently armed missions, sorted.
    pub fn active_missions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().signals.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, KillState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
