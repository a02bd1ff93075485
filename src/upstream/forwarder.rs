//! Upstream dispatch with timeout and retry.
//!
//! # Responsibilities
//! - Reject payloads failing the structured gate before any network call
//! - Send the request with a bounded wait for response headers
//! - Retry transient transport failures per the retry policy
//! - Hand back status, headers and an unread body stream
//!
//! # Design Decisions
//! - Redirects are never followed; 3xx responses reach the client as-is
//! - The body is not read here, so the response translator chooses how to consume it
//! - After the last attempt, a timeout surfaces as 504, anything else as 502

use std::error::Error as StdError;
use std::fmt;
use std::time::Instant;
use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    BoxError,
};
use futures_util::{StreamExt, TryStreamExt};

use crate::config::ProxyConfig;
use crate::http::request::OutboundRequest;
use crate::observability::metrics;
use crate::resilience::retries::{AttemptFailure, RetryPolicy};
use crate::resilience::timeouts::UpstreamTimeouts;
use crate::transform::BodyStream;
use crate::upstream::error::{ProxyError, ProxyOutcome};
use crate::upstream::payload::PayloadValidator;

/// Backend response with its body still on the wire.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self { status, headers, body }
    }

    fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(BoxError::from).boxed();
        Self::new(status, headers, body)
    }

    /// Consume the body as a single buffer.
    pub async fn into_bytes(self) -> Result<Bytes, BoxError> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes outbound requests against the backend.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    retry: RetryPolicy,
    timeouts: UpstreamTimeouts,
    payload: Option<PayloadValidator>,
}

impl Forwarder {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let timeouts = UpstreamTimeouts::from_config(&config.timeouts);
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeouts.connect)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(&config.retries),
            timeouts,
            payload: PayloadValidator::from_config(&config.validation),
        })
    }

    /// Validate, dispatch and retry; exactly one outcome per request.
    pub async fn forward(&self, request: &OutboundRequest) -> ProxyOutcome {
        if let Some(validator) = &self.payload {
            validator.check(request)?;
        }

        let max_attempts = self.retry.attempts_for(&request.method);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            match self.attempt(request).await {
                Ok(response) => {
                    tracing::debug!(
                        url = %request.url,
                        attempt,
                        status = %response.status(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Backend responded"
                    );
                    return Ok(UpstreamResponse::from_reqwest(response));
                }
                Err(failure) => {
                    tracing::warn!(
                        url = %request.url,
                        method = %request.method,
                        attempt,
                        max_attempts,
                        error = ?failure,
                        "Upstream attempt failed"
                    );

                    if self.retry.should_retry(&request.method, attempt, &failure) {
                        let delay = self.retry.delay(attempt);
                        metrics::record_retry(&request.method);
                        tracing::info!(attempt, delay = ?delay, "Retrying request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(match failure {
                        AttemptFailure::Timeout => ProxyError::UpstreamTimeout,
                        AttemptFailure::Network(detail) => ProxyError::UpstreamUnreachable(detail),
                        AttemptFailure::Fatal(detail) => ProxyError::Internal(detail),
                    });
                }
            }
        }
    }

    async fn attempt(&self, request: &OutboundRequest) -> Result<reqwest::Response, AttemptFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        match self.timeouts.response_within(builder.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(classify(&e)),
            Err(_) => Err(AttemptFailure::Timeout),
        }
    }
}

fn classify(err: &reqwest::Error) -> AttemptFailure {
    if err.is_timeout() {
        AttemptFailure::Timeout
    } else if err.is_builder() {
        AttemptFailure::Fatal(error_chain(err))
    } else {
        AttemptFailure::Network(error_chain(err))
    }
}

/// `outer: inner: root` message, skipping repeated text.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use url::Url;

    fn request(method: Method, url: &str, body: Option<&'static str>) -> OutboundRequest {
        OutboundRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: body.map(|b| Bytes::from_static(b.as_bytes())),
        }
    }

    fn fast_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.retries.delay_ms = 5;
        config.retries.max_delay_ms = 5;
        config.timeouts.connect_ms = 200;
        config.timeouts.response_ms = 200;
        config
    }

    /// A port with nothing listening on it.
    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let forwarder = Forwarder::from_config(&fast_config()).unwrap();
        let url = closed_port_url().await;

        let err = forwarder.forward(&request(Method::GET, &url, None)).await.unwrap_err();
        match err {
            ProxyError::UpstreamUnreachable(detail) => assert!(!detail.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payload_gate_runs_before_network() {
        let mut config = fast_config();
        config.validation.required_fields = vec!["prompt".into()];
        let forwarder = Forwarder::from_config(&config).unwrap();

        // Nothing listens here: a network attempt would yield 502, not 400.
        let url = closed_port_url().await;
        let err = forwarder
            .forward(&request(Method::POST, &url, Some(r#"{"model":"m"}"#)))
            .await
            .unwrap_err();
        assert_eq!(err, ProxyError::Validation("missing required field 'prompt'".into()));
    }

    #[tokio::test]
    async fn test_into_bytes_concatenates_chunks() {
        let response = UpstreamResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            crate::transform::chunks_stream(["ab", "cd"]),
        );
        assert_eq!(response.into_bytes().await.unwrap(), Bytes::from_static(b"abcd"));
    }

    #[test]
    fn test_error_chain_joins_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let outer = std::io::Error::other(inner);
        assert_eq!(error_chain(&outer), "connection refused");
    }
}
