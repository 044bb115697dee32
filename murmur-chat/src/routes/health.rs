use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use murmur_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use super::blocking;
use crate::store::Store;
use crate::AppState;

/// Health check that pings the chat store and reports live connections.
pub async fn health_check<S: Store>(State(state): State<Arc<AppState<S>>>) -> Response {
    let store_check = match blocking(&state, |chats| chats.store().read(|_| Ok(()))).await {
        Ok(()) => HealthCheck::healthy("store"),
        Err(e) => HealthCheck::unhealthy("store", e.to_string()),
    };
    let connections = HealthCheck {
        message: Some(format!("{} connected", state.connections.connected_count())),
        ..HealthCheck::healthy("live_connections")
    };

    let response = HealthResponse::healthy("murmur-chat", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![store_check, connections]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics; 404 when no recorder was installed.
pub async fn metrics<S: Store>(State(state): State<Arc<AppState<S>>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
