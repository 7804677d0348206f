//! Retry policy: exponential backoff with a cap and an attempt budget.

use crate::config::EmailQueueConfig;

/// Largest exponent applied to the base delay
const MAX_EXPONENT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_ms: u64, cap_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            cap_ms,
            max_attempts,
        }
    }

    /// `min(cap, base * 2^clamp(attempts - 1, 0, 20))`, saturating.
    pub fn delay_ms(&self, attempts: i32) -> u64 {
        let exponent = attempts.saturating_sub(1).clamp(0, MAX_EXPONENT as i32) as u32;
        self.base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.cap_ms)
    }

    /// Whether `attempts` failed attempts use up the budget.
    pub fn is_exhausted(&self, attempts: i32) -> bool {
        i64::from(attempts) >= i64::from(self.max_attempts)
    }

    /// `max_attempts` as stored in the `attempts` column.
    pub fn max_attempts_i32(&self) -> i32 {
        i32::try_from(self.max_attempts).unwrap_or(i32::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&EmailQueueConfig::default())
    }
}

impl From<&EmailQueueConfig> for RetryPolicy {
    fn from(config: &EmailQueueConfig) -> Self {
        Self::new(config.backoff_base_ms, config.backoff_cap_ms, config.max_attempts)
    }
}
