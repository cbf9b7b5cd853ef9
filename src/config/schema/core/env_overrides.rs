use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(workspace) = std::env::var("MISSIOND_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(url) = std::env::var("MISSIOND_ALERT_WEBHOOK_URL")
            .or_else(|_| std::env::var("ALERT_WEBHOOK_URL"))
            && !url.trim().is_empty()
        {
            self.alerts.webhook_url = Some(url.trim().to_string());
        }

        if let Ok(timeout_str) = std::env::var("MISSIOND_ALERT_TIMEOUT_SECS")
            && let Ok(timeout) = timeout_str.trim().parse::<u64>()
            && timeout > 0
        {
            self.alerts.timeout_secs = timeout;
        }

        if let Ok(level) = std::env::var("MISSIOND_LOG_LEVEL")
            && !level.trim().is_empty()
        {
            self.observability.log_level = level.trim().to_string();
        }

        if let Ok(poll_str) = std::env::var("MISSIOND_WATCHDOG_POLL_SECS")
            && let Ok(poll) = poll_str.trim().parse::<u64>()
        {
            self.watchdog.poll_interval_secs = poll;
        }

        if let Ok(stale_str) = std::env::var("MISSIOND_WATCHDOG_STALE_SECS")
            && let Ok(stale) = stale_str.trim().parse::<u64>()
        {
            self.watchdog.stale_threshold_secs = stale;
        }
    }
}
