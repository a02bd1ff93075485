//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::transform::StreamMode;

/// Root configuration for the tunnel proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Backend register storage.
    pub register: RegisterConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Response body transform.
    pub streaming: StreamingConfig,

    /// Structured payload gate applied before dispatch.
    pub validation: PayloadValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Control endpoint settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Largest inbound request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Where the current backend address lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// File holding the backend address. `None` keeps it in memory only.
    pub state_file: Option<PathBuf>,

    /// Reload the register when the state file is edited by another process.
    pub watch: bool,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            watch: true,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Time allowed for the backend to return response headers, per attempt.
    pub response_ms: u64,

    /// Longest pause tolerated between two response body chunks.
    pub idle_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 10_000,
            response_ms: 30_000,
            idle_ms: 60_000,
        }
    }
}

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Doubling delay with jitter, capped at `max_delay_ms`.
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Total attempts per request, the first one included.
    pub max_attempts: u32,

    /// Delay before each retry in milliseconds (base delay for exponential backoff).
    pub delay_ms: u64,

    /// Delay strategy.
    pub backoff: BackoffKind,

    /// Cap for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Also retry POST/PATCH. Off by default: a retried POST may apply twice upstream.
    pub retry_non_idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            delay_ms: 1000,
            backoff: BackoffKind::Fixed,
            max_delay_ms: 10_000,
            retry_non_idempotent: false,
        }
    }
}

/// Response body transform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Transform applied to every proxied response body.
    pub mode: StreamMode,

    /// Tokens per emitted batch in `words` mode.
    pub word_batch_size: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mode: StreamMode::Raw,
            word_batch_size: 10,
        }
    }
}

/// Required top-level JSON fields for backends expecting a structured payload.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PayloadValidationConfig {
    /// Field names that must be present and non-null. Empty disables the gate.
    pub required_fields: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Control endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on `/update_tunnel` and `/status`. `None` leaves them open.
    pub api_key: Option<String>,
}
