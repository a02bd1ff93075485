//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound connection establishment, time to response headers, and gaps
//!   between body chunks
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;

use crate::config::schema::TimeoutConfig;

/// Deadlines for every upstream wait. All are finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    pub connect: Duration,
    pub response: Duration,
    pub idle: Duration,
}

impl UpstreamTimeouts {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        // A zero deadline would fail every call; clamp to 1ms.
        let ms = |v: u64| Duration::from_millis(v.max(1));
        Self {
            connect: ms(config.connect_ms),
            response: ms(config.response_ms),
            idle: ms(config.idle_ms),
        }
    }

    /// Run `fut` under the response-header deadline.
    pub async fn response_within<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout(self.response, fut).await
    }
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}
