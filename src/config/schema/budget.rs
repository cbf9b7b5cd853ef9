use crate::platform::safety::BudgetConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default limits applied to mission runs. Unset fields are unlimited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetDefaults {
    #[serde(default)]
    pub max_time_secs: Option<f64>,
    #[serde(default)]
    pub max_actions: Option<u64>,
    #[serde(default)]
    pub max_cost_usd: Option<f64>,
}

impl BudgetDefaults {
    pub fn to_budget_config(&self) -> BudgetConfig {
        BudgetConfig {
            max_time: self
                .max_time_secs
                .and_then(|secs| Duration::try_from_secs_f64(secs.max(0.0)).ok()),
            max_actions: self.max_actions,
            max_cost_usd: self.max_cost_usd,
        }
    }
}
