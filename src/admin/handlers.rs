use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::register::{BackendAddress, RegisterError};

#[derive(Debug, Serialize)]
pub struct TunnelUpdated {
    pub message: &'static str,
    pub tunnel_url: String,
}

#[derive(Debug, Serialize)]
pub struct TunnelStatus {
    pub current_url: Option<String>,
    pub is_url_valid: bool,
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        let status = match self {
            RegisterError::Validation(_) => StatusCode::BAD_REQUEST,
            RegisterError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn missing_tunnel_url() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Missing 'tunnel_url' in request" })),
    )
        .into_response()
}

/// `POST /update_tunnel` with `{"tunnel_url": "..."}`.
pub async fn update_tunnel(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => match map.get("tunnel_url") {
            Some(Value::String(url)) => url.clone(),
            _ => return missing_tunnel_url(),
        },
        _ => return missing_tunnel_url(),
    };

    // File-backed stores do blocking I/O under the register lock.
    let register = state.register.clone();
    let result = match tokio::task::spawn_blocking(move || register.set(&raw)).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Register update task failed");
            metrics::record_backend_update("error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Server error" })),
            )
                .into_response();
        }
    };

    match result {
        Ok(address) => {
            metrics::record_backend_update("ok");
            Json(TunnelUpdated {
                message: "Tunnel URL updated successfully",
                tunnel_url: address.to_string(),
            })
            .into_response()
        }
        Err(err) => {
            metrics::record_backend_update(match err {
                RegisterError::Validation(_) => "rejected",
                RegisterError::Persistence(_) => "persistence_error",
            });
            tracing::warn!(error = %err, "Backend update failed");
            err.into_response()
        }
    }
}

/// `GET /status`.
pub async fn get_status(State(state): State<AppState>) -> Json<TunnelStatus> {
    let current = state.register.get();
    let is_url_valid = current
        .as_deref()
        .is_some_and(|addr| BackendAddress::parse(addr.as_str()).is_ok());

    Json(TunnelStatus {
        current_url: current.map(|addr| addr.to_string()),
        is_url_valid,
    })
}
