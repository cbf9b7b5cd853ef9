use super::state::MissionState;
use super::types::Mission;
use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

/// Persistent mission store consumed by the watchdog.
///
/// The store is the single source of truth for mission state and must
/// serialize concurrent transition requests. `transition_mission` validates
/// the move through the state machine and appends one audit event.
pub trait MissionStore: Send + Sync {
    /// Missions currently in `state`, in store order.
    fn list_missions(
        &self,
        state: MissionState,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Mission>>> + Send + '_>>;

    fn transition_mission<'a>(
        &'a self,
        mission_id: &'a str,
        to: MissionState,
        reason: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Mission>> + Send + 'a>>;

    /// Returns the new retry count.
    fn increment_mission_retry<'a>(
        &'a self,
        mission_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32>> + Send + 'a>>;
}
