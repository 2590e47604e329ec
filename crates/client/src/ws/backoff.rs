//! Reconnect backoff policy.

use std::time::Duration;

/// Exponential backoff: `delay(attempt) = min(initial * 2^attempt, max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of automatic reconnect attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
        }
    }
}

impl BackoffPolicy {
    /// Calculate delay for a given attempt number
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^31 * 1ms is already far past any sane cap
        if attempt >= 31 {
            return self.max_delay;
        }
        let initial_ms = self.initial_delay.as_millis().min(u64::MAX as u128) as u64;
        let delay_ms = initial_ms.saturating_mul(1u64 << attempt);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

/// Reconnect bookkeeping for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectState {
    pub attempt: u32,
}

impl ReconnectState {
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Claim the next retry. Returns the delay to wait, or `None` once the
    /// policy's attempts are used up.
    pub fn next_delay(&mut self, policy: &BackoffPolicy) -> Option<Duration> {
        if self.attempt >= policy.max_attempts {
            return None;
        }
        let delay = policy.delay(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}
