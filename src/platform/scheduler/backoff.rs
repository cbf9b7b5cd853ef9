use rand::Rng;
use std::time::Duration;

/// Exponential retry backoff with multiplicative jitter.
///
/// `delay(n) = max(floor, min(base * 2^n, max) * U[1 - jitter, 1 + jitter])`,
/// recomputed for every retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter_fraction: f64,
    pub floor: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(300),
            jitter_fraction: 0.25,
            floor: Duration::from_millis(100),
        }
    }
}

impl BackoffPolicy {
    /// Un-jittered delay for the zero-based retry `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
        let secs = self.base.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs.min(self.max.as_secs_f64())).unwrap_or(self.max)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = self.jitter();
        if jitter == 0.0 {
            return self.delay_with_factor(attempt, 1.0);
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        self.delay_with_factor(attempt, factor)
    }

    /// Scales the capped delay by `factor`; a non-finite factor counts as 1.
    pub fn delay_with_factor(&self, attempt: u32, factor: f64) -> Duration {
        let factor = if factor.is_finite() { factor.max(0.0) } else { 1.0 };
        let secs = self.base_delay(attempt).as_secs_f64() * factor;
        self.clamp_to_floor(secs)
    }

    /// Largest delay `delay` can return.
    pub fn upper_bound(&self) -> Duration {
        self.clamp_to_floor(self.max.as_secs_f64() * (1.0 + self.jitter()))
    }

    /// Jitter in `[0, 0.99]`; NaN disables jitter.
    fn jitter(&self) -> f64 {
        if self.jitter_fraction.is_finite() {
            self.jitter_fraction.clamp(0.0, 0.99)
        } else {
            0.0
        }
    }

    fn clamp_to_floor(&self, secs: f64) -> Duration {
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .max(self.floor)
    }
}
