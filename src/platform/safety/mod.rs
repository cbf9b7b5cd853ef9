//! Per-run budgets and the emergency kill switch.
//!
//! Both hold process-local state only. Persisted mission state is the
//! source of truth across restarts.

mod budget;
mod kill_switch;

pub use budget::{BudgetConfig, BudgetEnforcer, BudgetLimits, BudgetSummary, BudgetUsage};
pub use kill_switch::{DEFAULT_KILL_REASON, KillSwitch};
