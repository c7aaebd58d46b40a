//! Exponential backoff with jitter between delivery rounds.

use std::time::Duration;

use rand::RngExt;
use tokio_util::sync::CancellationToken;

use crate::error::{GcmError, Result};

/// Delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
/// The delay stops doubling once it would reach this value.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1_024_000);

/// Backoff configuration.
///
/// The base delay for attempt `k` (1-based) is `initial_delay * 2^(k-1)`,
/// except that doubling stops as soon as the doubled value would reach
/// `max_delay`. The actual sleep is jittered into `[delay/2, delay*3/2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    /// Delay following `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        match current.checked_mul(2) {
            Some(doubled) if doubled < self.max_delay => doubled,
            _ => current,
        }
    }

    /// Base (unjittered) delay for a 1-based attempt index.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            let next = self.next_delay(delay);
            if next == delay {
                break;
            }
            delay = next;
        }
        delay
    }

    /// Sleep duration for a base delay: `delay/2 + uniform[0, delay)`.
    pub fn jittered(&self, delay: Duration) -> Duration {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if delay_ms == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::rng().random_range(0..delay_ms);
        Duration::from_millis(delay_ms / 2 + jitter_ms)
    }

    /// Jittered sleep duration for a 1-based attempt index.
    pub fn sleep_for_attempt(&self, attempt: u32) -> Duration {
        self.jittered(self.delay_for_attempt(attempt))
    }
}

/// Sleep for `duration` unless `token` is cancelled first.
pub async fn cancellable_sleep(duration: Duration, token: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = token.cancelled() => Err(GcmError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
