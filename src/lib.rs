//! Dynamically retargetable HTTP reverse proxy.
//!
//! Every request is forwarded to a single backend whose address can be
//! replaced at runtime through the control endpoint.

// Core pipeline
pub mod config;
pub mod http;
pub mod register;
pub mod transform;
pub mod upstream;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use register::BackendRegister;
