use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Serializes env-var mutation across tests and restores every touched
/// variable when dropped.
pub(super) struct EnvScope {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvScope {
    /// Takes the process-wide env lock and clears every `MISSIOND_*`
    /// override so tests start from a known state.
    pub(super) fn isolated() -> Self {
        let mut scope = Self {
            saved: Vec::new(),
            _lock: ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
        };
        for key in [
            "MISSIOND_WORKSPACE",
            "MISSIOND_ALERT_WEBHOOK_URL",
            "ALERT_WEBHOOK_URL",
            "MISSIOND_ALERT_TIMEOUT_SECS",
            "MISSIOND_LOG_LEVEL",
            "MISSIOND_WATCHDOG_POLL_SECS",
            "MISSIOND_WATCHDOG_STALE_SECS",
        ] {
            scope.unset(key);
        }
        scope
    }

    pub(super) fn set(&mut self, key: &'static str, value: &str) {
        self.remember(key);
        // SAFETY: test-only; ENV_LOCK is held for the lifetime of the scope.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    pub(super) fn unset(&mut self, key: &'static str) {
        self.remember(key);
        // SAFETY: test-only; ENV_LOCK is held for the lifetime of the scope.
        unsafe {
            std::env::remove_var(key);
        }
    }

    fn remember(&mut self, key: &'static str) {
        if !self.saved.iter().any(|(saved, _)| *saved == key) {
            self.saved.push((key, std::env::var(key).ok()));
        }
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..).rev() {
            // SAFETY: test-only restoration; ENV_LOCK is released after this.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
