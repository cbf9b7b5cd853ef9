use crate::mission::MissionState;
use thiserror::Error;

// ─── Mission lifecycle errors ───────────────────────────────────────────────

/// Errors raised by the mission state machine and the mission store.
///
/// Store plumbing returns `anyhow::Result`; callers that need to branch on
/// the failure kind use `err.downcast_ref::<MissionError>()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MissionError {
    #[error("unknown mission state: '{0}'")]
    UnknownState(String),

    #[error("transition '{from}' -> '{to}' is not allowed")]
    InvalidTransition {
        from: MissionState,
        to: MissionState,
    },

    #[error("mission '{0}' not found")]
    NotFound(String),

    #[error("mission '{0}' changed state concurrently")]
    ConcurrentUpdate(String),
}

// ─── Budget errors ──────────────────────────────────────────────────────────

/// Raised the first time a tracked mission run meets one of its limits.
///
/// The step-execution loop is expected to propagate this and end the run.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("mission {mission_id} budget breach: {reason}")]
pub struct BudgetBreach {
    pub mission_id: String,
    pub reason: String,
}

// ─── Config errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
