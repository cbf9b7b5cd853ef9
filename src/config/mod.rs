pub mod schema;

pub use schema::{
    AlertsConfig, BudgetDefaults, Config, ObservabilityConfig, SchedulerConfig, WatchdogConfig,
};
