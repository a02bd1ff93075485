//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → body limit layer (server.rs)
//!     → headers.rs (strip hop-by-hop, set X-Forwarded-*)
//!     → forwarded to backend
//!
//! Backend response:
//!     → headers.rs (strip hop-by-hop and framing headers)
//! ```
//!
//! # Design Decisions
//! - No trust in client input: forwarding metadata is always rewritten

pub mod headers;
