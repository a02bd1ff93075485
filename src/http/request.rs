//! Request handling and transformation.
//!
//! # Responsibilities
//! - Capture the inbound request (method, path, query, headers, body, peer)
//! - Build the outbound request against the current backend
//!
//! # Design Decisions
//! - Target URL is `backend + "/" + path`, query string appended unchanged
//! - Body is buffered once and attached only for POST/PUT/PATCH, so retries
//!   resend identical bytes
//! - Cookies travel in the `Cookie` header(s) untouched; none are rebuilt or dropped
//! - The outbound request is immutable once built

use std::net::SocketAddr;
use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, Uri},
};
use url::Url;

use crate::register::BackendAddress;
use crate::security::headers::{apply_forwarded_headers, filter_request_headers};
use crate::upstream::error::ProxyError;

/// What the proxy keeps of a client request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

/// Methods whose body is forwarded.
pub fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

impl InboundRequest {
    /// Buffer an axum request. Bodies of other methods are not read.
    pub async fn from_request(request: Request<Body>, max_body_bytes: usize) -> Result<Self, ProxyError> {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let (parts, body) = request.into_parts();

        let body = if carries_body(&parts.method) {
            axum::body::to_bytes(body, max_body_bytes)
                .await
                .map_err(|e| ProxyError::Validation(format!("failed to read request body: {}", e)))?
        } else {
            Bytes::new()
        };

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    /// Scheme the client used to reach the proxy.
    fn scheme(&self) -> &str {
        self.uri.scheme_str().unwrap_or("http")
    }
}

/// Fully resolved request for the backend.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Build the backend request for `inbound` against `backend`.
pub fn translate(inbound: &InboundRequest, backend: &BackendAddress) -> Result<OutboundRequest, ProxyError> {
    let mut target = backend.join(inbound.uri.path());
    if let Some(query) = inbound.uri.query() {
        target.push('?');
        target.push_str(query);
    }
    let url = Url::parse(&target)
        .map_err(|e| ProxyError::Internal(format!("cannot build target URL '{}': {}", target, e)))?;

    let mut headers = filter_request_headers(&inbound.headers);
    apply_forwarded_headers(
        &mut headers,
        inbound.client_addr,
        inbound.scheme(),
        inbound.headers.get(header::HOST),
    );

    let body = carries_body(&inbound.method).then(|| inbound.body.clone());

    Ok(OutboundRequest {
        method: inbound.method.clone(),
        url,
        headers,
        body,
    })
}
