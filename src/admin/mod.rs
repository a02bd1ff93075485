//! Control endpoints for the backend register.
//!
//! `POST /update_tunnel` replaces the backend address, `GET /status` reports it.
//! Both sit behind the optional bearer-token check in `auth.rs`. Any other
//! method on these paths is proxied like every other request.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use crate::http::server::{proxy_handler, AppState};
use self::auth::admin_auth_middleware;
use self::handlers::{get_status, update_tunnel};

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    // Per-method route_layer, so the auth check never wraps the proxy fallback.
    let auth = middleware::from_fn_with_state(state, admin_auth_middleware);

    Router::new()
        .route(
            "/update_tunnel",
            post(update_tunnel).route_layer(auth.clone()).fallback(proxy_handler),
        )
        .route(
            "/status",
            get(get_status).route_layer(auth).fallback(proxy_handler),
        )
}
