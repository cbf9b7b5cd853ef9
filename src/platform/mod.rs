pub mod alerts;
pub mod daemon;
pub mod safety;
pub mod scheduler;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod test_support;

pub use alerts::{AlertKind, AlertSink, LogAlertSink, WebhookAlertSink};
pub use safety::{BudgetConfig, BudgetEnforcer, BudgetSummary, BudgetUsage, KillSwitch};
pub use scheduler::{BackoffPolicy, JobPhase, JobStatus, MissionExecutor, MissionScheduler};
pub use watchdog::{MissionWatchdog, ScanReport};
