//! Header manipulation across the proxy boundary.
//!
//! # Responsibilities
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Strip hop-by-hop headers in both directions
//! - Strip framing headers from backend responses (the serving layer reframes)
//!
//! # Design Decisions
//! - X-Forwarded-* are overwritten, never appended: inbound values are untrusted
//! - Filtering builds a new map; header order and repeated values are preserved

use std::net::SocketAddr;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Headers meaningful only for a single connection leg.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Headers copied to the backend: everything except `Host`, hop-by-hop,
/// `Content-Length` (recomputed from the forwarded body) and `Accept-Encoding`
/// (the upstream client negotiates compression itself).
pub fn filter_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len() + 3);
    for (name, value) in inbound {
        if *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || *name == header::ACCEPT_ENCODING
            || is_hop_by_hop(name)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers copied to the client: everything except hop-by-hop and framing headers.
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if *name == header::CONTENT_LENGTH
            || *name == header::CONTENT_ENCODING
            || is_hop_by_hop(name)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Set forwarding metadata describing the inbound leg.
pub fn apply_forwarded_headers(
    headers: &mut HeaderMap,
    client_addr: Option<SocketAddr>,
    scheme: &str,
    inbound_host: Option<&HeaderValue>,
) {
    headers.remove(&X_FORWARDED_FOR);
    headers.remove(&X_FORWARDED_PROTO);
    headers.remove(&X_FORWARDED_HOST);

    if let Some(addr) = client_addr {
        if let Ok(value) = HeaderValue::from_str(&addr.ip().to_string()) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(scheme) {
        headers.insert(X_FORWARDED_PROTO, value);
    }
    if let Some(host) = inbound_host {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
}
