//! `axum` router: WebSocket upgrade plus the liveness/metrics introspection
//! endpoints (spec §6, "Observability").

use super::connection::handle_socket;
use crate::orchestrator::Orchestrator;
use crate::telemetry::Telemetry;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub telemetry: Arc<Telemetry>,
    pub active_connections: Arc<AtomicUsize>,
    pub max_connections: usize,
    pub ping_interval: Duration,
    pub message_queue_size: usize,
}

pub fn build_router(state: GatewayState, cors_origin: &str) -> Router {
    let cors = if cors_origin == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origin: axum::http::HeaderValue = cors_origin
            .parse()
            .unwrap_or_else(|_| axum::http::HeaderValue::from_static("*"));
        CorsLayer::new().allow_origin(origin)
    };

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(cors)
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn healthz() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "ok"}))
}

async fn metrics(State(state): State<GatewayState>) -> impl IntoResponse {
    let snapshot = state.telemetry.snapshot(
        state.active_connections.load(std::sync::atomic::Ordering::Relaxed),
        state.max_connections,
    );
    axum::Json(snapshot)
}
