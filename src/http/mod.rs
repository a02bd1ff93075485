//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, control routes vs. catch-all)
//!     → register snapshot (503 when unset)
//!     → request.rs (capture inbound request, build outbound request)
//!     → upstream::Forwarder (validate, send, retry)
//!     → response.rs (filter headers, stream-mode transform)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, OutboundRequest};
pub use response::ResponseTranslator;
pub use server::{AppState, HttpServer};
