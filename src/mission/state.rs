use crate::error::MissionError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::Display;

/// Lifecycle state of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MissionState {
    Idle,
    Running,
    Blocked,
    Paused,
    Failed,
    Completed,
}

impl MissionState {
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Running,
        Self::Blocked,
        Self::Paused,
        Self::Failed,
        Self::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Paused => "paused",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    /// Completed and failed missions are not progressing. Both can still be
    /// re-queued into `idle`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for MissionState {
    type Err = MissionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| MissionError::UnknownState(value.to_string()))
    }
}

const ALLOWED_TRANSITIONS: [(MissionState, MissionState); 12] = [
    (MissionState::Idle, MissionState::Running),
    (MissionState::Idle, MissionState::Failed),
    (MissionState::Running, MissionState::Blocked),
    (MissionState::Running, MissionState::Failed),
    (MissionState::Running, MissionState::Completed),
    (MissionState::Running, MissionState::Paused),
    (MissionState::Blocked, MissionState::Running),
    (MissionState::Blocked, MissionState::Failed),
    (MissionState::Paused, MissionState::Running),
    (MissionState::Paused, MissionState::Failed),
    (MissionState::Completed, MissionState::Idle),
    (MissionState::Failed, MissionState::Idle),
];

pub fn validate_transition(from: MissionState, to: MissionState) -> Result<(), MissionError> {
    if ALLOWED_TRANSITIONS.contains(&(from, to)) {
        Ok(())
    } else {
        Err(MissionError::InvalidTransition { from, to })
    }
}

/// States reachable from `state`, sorted by name.
pub fn allowed_next_states(state: MissionState) -> Vec<MissionState> {
    let mut next: Vec<MissionState> = ALLOWED_TRANSITIONS
        .iter()
        .filter(|(from, _)| *from == state)
        .map(|(_, to)| *to)
        .collect();
    next.sort_by_key(|s| s.as_str());
    next
}

pub fn is_terminal(state: MissionState) -> bool {
    state.is_terminal()
}
