//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum Router: control endpoints plus the catch-all proxy route
//! - Wire up middleware (request ID, tracing, body limit)
//! - Serve on a listener until the shutdown signal fires
//! - Run the per-request pipeline: snapshot backend, translate, forward, respond

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::http::request::{translate, InboundRequest};
use crate::http::response::ResponseTranslator;
use crate::observability::metrics;
use crate::register::BackendRegister;
use crate::upstream::error::{ProxyError, ProxyOutcome};
use crate::upstream::forwarder::Forwarder;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub register: Arc<BackendRegister>,
    pub forwarder: Arc<Forwarder>,
    pub responses: Arc<ResponseTranslator>,
    pub config: Arc<ProxyConfig>,
}

impl AppState {
    pub fn new(config: ProxyConfig, register: Arc<BackendRegister>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            register,
            forwarder: Arc::new(Forwarder::from_config(&config)?),
            responses: Arc::new(ResponseTranslator::from_config(&config)),
            config: Arc::new(config),
        })
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ProxyConfig, register: Arc<BackendRegister>) -> Result<Self, reqwest::Error> {
        let state = AppState::new(config, register)?;
        let router = build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            stream_mode = %self.state.responses.mode(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.listener.max_body_bytes;

    Router::new()
        .merge(setup_admin_router(state.clone()))
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
}

pub(crate) async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    let outcome = proxy_request(&state, request).await;
    if let Err(err) = &outcome {
        tracing::warn!(request_id = %request_id, error = %err, kind = err.kind(), "Proxy request failed");
    }

    let response = state.responses.translate(outcome);
    metrics::record_request(&method, response.status(), started);
    response
}

/// Everything up to the response decision, without rendering.
pub async fn proxy_request(state: &AppState, request: Request<Body>) -> ProxyOutcome {
    // Snapshot once; a concurrent update does not affect this request.
    let backend = state.register.get().ok_or(ProxyError::BackendUnset)?;

    let inbound = InboundRequest::from_request(request, state.config.listener.max_body_bytes).await?;
    let outbound = translate(&inbound, &backend)?;
    state.forwarder.forward(&outbound).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(ProxyConfig::default(), Arc::new(BackendRegister::in_memory())).unwrap()
    }

    #[tokio::test]
    async fn test_unset_backend_is_503() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/anything?x=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_proxy_request_checks_backend_first() {
        let state = state();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .body(Body::from("{}"))
            .unwrap();
        assert_eq!(proxy_request(&state, request).await.unwrap_err(), ProxyError::BackendUnset);
    }
}
