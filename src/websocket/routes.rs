use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::metrics::MetricsSnapshot;
use crate::server::GameServer;

use super::handler::websocket_handler;

/// Axum router: WebSocket upgrade, health check, metrics snapshot, and
/// static assets from the configured directory.
pub fn create_router(static_dir: &str) -> axum::Router<Arc<GameServer>> {
    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_handler(State(server): State<Arc<GameServer>>) -> Json<MetricsSnapshot> {
    Json(server.metrics.snapshot())
}
