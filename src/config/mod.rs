//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI / environment overrides
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the backend address changes at runtime
//! - All fields have defaults, so running with no file at all is valid
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, ConfigOverrides};
pub use schema::{
    AdminConfig, BackoffKind, ListenerConfig, LogFormat, ObservabilityConfig, PayloadValidationConfig,
    ProxyConfig, RegisterConfig, RetryConfig, StreamingConfig, TimeoutConfig,
};
