//! Delay between attempts: fixed, or exponential with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::schema::{BackoffKind, RetryConfig};

/// Delay schedule for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(kind: BackoffKind, base_ms: u64, max_ms: u64) -> Self {
        Self { kind, base_ms, max_ms: max_ms.max(base_ms) }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.backoff, config.delay_ms, config.max_delay_ms)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match self.kind {
            BackoffKind::Fixed => Duration::from_millis(self.base_ms),
            BackoffKind::Exponential => {
                let factor = 2u64.saturating_pow(attempt - 1);
                let capped = self.base_ms.saturating_mul(factor).min(self.max_ms);

                // Jitter: 0 to 10% of the delay.
                let jitter_range = capped / 10;
                let jitter = if jitter_range > 0 {
                    rand::thread_rng().gen_range(0..jitter_range)
                } else {
                    0
                };
                Duration::from_millis(capped + jitter)
            }
        }
    }
}
