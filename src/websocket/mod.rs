//! WebSocket transport: connection upgrade, per-connection send/receive
//! tasks, and the HTTP admin surface.

mod admin;
mod connection;
mod handler;
mod routes;
mod sending;

pub use admin::{ice_config_handler, metrics_handler, prometheus_metrics_handler, stats_handler};
pub use routes::{create_router, AppState};
