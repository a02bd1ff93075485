//! Proxy outcome taxonomy.
//!
//! Every inbound request ends in exactly one `ProxyOutcome`: a backend
//! response to relay, or one of the failures below, each with a fixed
//! client-visible status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::upstream::forwarder::UpstreamResponse;

/// Result of proxying one request.
pub type ProxyOutcome = Result<UpstreamResponse, ProxyError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Client payload rejected before any network call.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No backend address has been configured yet.
    #[error("Tunnel URL not set")]
    BackendUnset,

    /// The backend did not answer within the configured deadline.
    #[error("Request timed out")]
    UpstreamTimeout,

    /// Transport failures persisted through every allowed attempt.
    #[error("Request failed: {0}")]
    UpstreamUnreachable(String),

    /// Proxy-side failure while building the request or response.
    #[error("Server error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Validation(_) => StatusCode::BAD_REQUEST,
            ProxyError::BackendUnset => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name, used in payloads and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation_error",
            ProxyError::BackendUnset => "backend_unset",
            ProxyError::UpstreamTimeout => "upstream_timeout",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        // Internal details stay in the logs.
        let message = match &self {
            ProxyError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal proxy error");
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": message,
            "kind": self.kind(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
