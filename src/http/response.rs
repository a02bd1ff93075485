//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a forwarding outcome into exactly one client response
//! - Copy backend status and headers, minus framing and hop-by-hop headers
//! - Re-emit the backend body through the configured stream mode
//!
//! # Design Decisions
//! - Bodies are never buffered whole; emission starts with the first unit
//! - Failures render as `{"error", "kind"}` JSON with the mapped status

use std::time::Duration;
use axum::{
    body::Body,
    response::{IntoResponse, Response},
};

use crate::config::{ProxyConfig, StreamingConfig};
use crate::security::headers::filter_response_headers;
use crate::transform::{transform_body, StreamMode};
use crate::upstream::error::{ProxyError, ProxyOutcome};

#[derive(Debug, Clone)]
pub struct ResponseTranslator {
    mode: StreamMode,
    word_batch_size: usize,
    idle: Duration,
}

impl ResponseTranslator {
    pub fn new(streaming: &StreamingConfig, idle: Duration) -> Self {
        Self {
            mode: streaming.mode,
            word_batch_size: streaming.word_batch_size,
            idle,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            &config.streaming,
            Duration::from_millis(config.timeouts.idle_ms.max(1)),
        )
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Render one outcome for the client.
    pub fn translate(&self, outcome: ProxyOutcome) -> Response {
        let upstream = match outcome {
            Ok(upstream) => upstream,
            Err(err) => return err.into_response(),
        };

        let headers = filter_response_headers(&upstream.headers);
        let body = transform_body(
            upstream.body,
            self.mode.transformer(self.word_batch_size),
            self.idle,
        );

        let mut builder = Response::builder().status(upstream.status);
        if let Some(target) = builder.headers_mut() {
            *target = headers;
        }
        builder
            .body(Body::from_stream(body))
            .unwrap_or_else(|e| ProxyError::Internal(format!("cannot build response: {}", e)).into_response())
    }
}
