mod alerts;
mod budget;
mod core;
mod observability;
mod scheduler;
mod watchdog;

pub use alerts::AlertsConfig;
pub use budget::BudgetDefaults;
pub use core::Config;
pub use observability::ObservabilityConfig;
pub use scheduler::SchedulerConfig;
pub use watchdog::WatchdogConfig;
