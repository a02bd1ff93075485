//! Backend communication: payload gate, dispatch, retry.
//!
//! # Data Flow
//! ```text
//! OutboundRequest
//!     → payload.rs (optional structured-body gate)
//!     → forwarder.rs (send, bounded wait, retry transient failures)
//!     → ProxyOutcome (UpstreamResponse or ProxyError)
//! ```

pub mod error;
pub mod forwarder;
pub mod payload;

pub use error::{ProxyError, ProxyOutcome};
pub use forwarder::{Forwarder, UpstreamResponse};
pub use payload::PayloadValidator;
