//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (enforce connect/response/idle deadlines)
//!     → On failure: retries.rs (check if retryable, retry after backoff.rs delay)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for idempotent requests unless explicitly widened

pub mod backoff;
pub mod retries;
pub mod timeouts;
