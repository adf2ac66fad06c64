use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::metrics::Metrics;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub consumer_topic: String,
    pub producer_topic: String,
}

/// Shared state for liveness endpoints
#[derive(Clone)]
pub struct ServerState {
    pub consumer_topic: String,
    pub producer_topic: String,
    pub metrics: Arc<Metrics>,
}

/// Index endpoint - static body for operational liveness probes
async fn index() -> &'static str {
    "Running"
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        consumer_topic: state.consumer_topic.clone(),
        producer_topic: state.producer_topic.clone(),
    })
}

async fn prom_metrics(State(state): State<ServerState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Create the liveness server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(prom_metrics))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn run_server(
    listener: TcpListener,
    state: ServerState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
