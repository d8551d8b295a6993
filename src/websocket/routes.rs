use crate::config::IceServerConfig;
use crate::server::ChatServer;
use axum::extract::{FromRef, State};
use axum::routing::get;
use std::sync::Arc;

use super::admin::{
    ice_config_handler, metrics_handler, prometheus_metrics_handler, stats_handler,
};
use super::handler::websocket_handler;

/// Shared router state: the server itself plus the verbatim ICE passthrough.
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<ChatServer>,
    pub ice_servers: Arc<Vec<IceServerConfig>>,
}

impl FromRef<AppState> for Arc<ChatServer> {
    fn from_ref(state: &AppState) -> Self {
        state.server.clone()
    }
}

impl FromRef<AppState> for Arc<Vec<IceServerConfig>> {
    fn from_ref(state: &AppState) -> Self {
        state.ice_servers.clone()
    }
}

/// Create the Axum router with WebSocket support
pub fn create_router(cors_origins: &str) -> axum::Router<AppState> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    // Parse CORS origins
    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prom", get(prometheus_metrics_handler))
        .route("/ice-config", get(ice_config_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_check(State(server): State<Arc<ChatServer>>) -> axum::response::Result<&'static str> {
    if server.health_check() {
        Ok("OK")
    } else {
        Err(axum::http::StatusCode::SERVICE_UNAVAILABLE.into())
    }
}
