//! Retry policy.
//!
//! # Responsibilities
//! - Decide how many attempts a request may use, keyed by method
//! - Classify failures as transient (retry) or final
//! - Supply the delay before each retry
//!
//! # Design Decisions
//! - Only idempotent methods are retried by default; POST/PATCH need
//!   `retry_non_idempotent`, since a retried POST may apply twice upstream
//! - Only transport failures (connect, reset, timeout) are retried;
//!   any HTTP response, 5xx included, is relayed as-is

use std::time::Duration;
use axum::http::Method;

use crate::config::schema::RetryConfig;
use crate::resilience::backoff::Backoff;

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// No response headers before the deadline, or connect timed out.
    Timeout,
    /// Connection refused/reset or the exchange broke off.
    Network(String),
    /// The request could not be built; retrying cannot help.
    Fatal(String),
}

impl AttemptFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptFailure::Timeout | AttemptFailure::Network(_))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    enabled: bool,
    max_attempts: u32,
    retry_non_idempotent: bool,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts.max(1),
            retry_non_idempotent: config.retry_non_idempotent,
            backoff: Backoff::from_config(config),
        }
    }

    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self::from_config(&RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        })
    }

    /// Whether requests with this method may be sent more than once.
    pub fn allows(&self, method: &Method) -> bool {
        self.enabled && (method.is_idempotent() || self.retry_non_idempotent)
    }

    /// Total attempts available for a request with this method.
    pub fn attempts_for(&self, method: &Method) -> u32 {
        if self.allows(method) {
            self.max_attempts
        } else {
            1
        }
    }

    /// Should attempt number `attempt` (1-based) be followed by another?
    pub fn should_retry(&self, method: &Method, attempt: u32, failure: &AttemptFailure) -> bool {
        failure.is_transient() && attempt < self.attempts_for(method)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
