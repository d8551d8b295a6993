//! HTTP admin surface: stats, metrics, and the ICE config passthrough.

use crate::config::IceServerConfig;
use crate::metrics::MetricsSnapshot;
use crate::server::ChatServer;
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

/// Live pairing counts as JSON.
pub async fn stats_handler(
    State(server): State<Arc<ChatServer>>,
) -> axum::response::Json<serde_json::Value> {
    let stats = server.stats_snapshot().await;
    axum::response::Json(serde_json::json!(stats))
}

/// Full metrics snapshot as JSON.
pub async fn metrics_handler(
    State(server): State<Arc<ChatServer>>,
) -> axum::response::Json<serde_json::Value> {
    let snapshot = server.metrics().snapshot().await;
    axum::response::Json(serde_json::json!(snapshot))
}

/// Metrics snapshot rendered in Prometheus text exposition format.
pub async fn prometheus_metrics_handler(State(server): State<Arc<ChatServer>>) -> impl IntoResponse {
    let snapshot = server.metrics().snapshot().await;
    let stats = server.stats_snapshot().await;
    let mut body = render_prometheus_metrics(&snapshot);

    use std::fmt::Write;
    let _ = writeln!(body, "# HELP pairlink_online_peers Connected peers");
    let _ = writeln!(body, "# TYPE pairlink_online_peers gauge");
    let _ = writeln!(body, "pairlink_online_peers {}", stats.online_peers);
    let _ = writeln!(body, "# HELP pairlink_searching_peers Peers in the waiting pool");
    let _ = writeln!(body, "# TYPE pairlink_searching_peers gauge");
    let _ = writeln!(body, "pairlink_searching_peers {}", stats.searching_peers);
    let _ = writeln!(body, "# HELP pairlink_active_pairs Live pairs");
    let _ = writeln!(body, "# TYPE pairlink_active_pairs gauge");
    let _ = writeln!(body, "pairlink_active_pairs {}", stats.active_pairs);
    let _ = writeln!(body, "# HELP pairlink_active_calls Calls offered or answered");
    let _ = writeln!(body, "# TYPE pairlink_active_calls gauge");
    let _ = writeln!(body, "pairlink_active_calls {}", stats.active_calls);

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

/// ICE servers for clients, passed through from configuration verbatim. The
/// server itself never dials them.
pub async fn ice_config_handler(
    State(ice_servers): State<Arc<Vec<IceServerConfig>>>,
) -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({ "iceServers": *ice_servers }))
}

/// Render the counter snapshot into Prometheus text exposition format.
fn render_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    use std::fmt::Write;

    fn counter(buf: &mut String, name: &str, help: &str, value: u64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} counter");
        let _ = writeln!(buf, "{name} {value}");
    }

    fn gauge_f64(buf: &mut String, name: &str, help: &str, value: f64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} gauge");
        let _ = writeln!(buf, "{name} {value}");
    }

    let mut buf = String::new();

    counter(
        &mut buf,
        "pairlink_connections_total",
        "Total WebSocket connections accepted",
        snapshot.connections.total_connections,
    );
    counter(
        &mut buf,
        "pairlink_disconnections_total",
        "Total disconnections",
        snapshot.connections.disconnections,
    );
    counter(
        &mut buf,
        "pairlink_messages_dropped_total",
        "Outbound messages dropped on full queues",
        snapshot.connections.websocket_messages_dropped,
    );
    counter(
        &mut buf,
        "pairlink_registrations_total",
        "Profiles registered",
        snapshot.sessions.registrations,
    );
    counter(
        &mut buf,
        "pairlink_inactive_disconnects_total",
        "Peers disconnected by the inactivity sweep",
        snapshot.sessions.inactive_disconnects,
    );
    counter(
        &mut buf,
        "pairlink_searches_started_total",
        "Searches started",
        snapshot.matching.searches_started,
    );
    counter(
        &mut buf,
        "pairlink_search_timeouts_total",
        "Searches that hit the wait ceiling",
        snapshot.matching.search_timeouts,
    );
    counter(
        &mut buf,
        "pairlink_matches_committed_total",
        "Pairs committed",
        snapshot.matching.matches_committed,
    );
    counter(
        &mut buf,
        "pairlink_match_conflicts_total",
        "Pair commits lost to races",
        snapshot.matching.match_commit_conflicts,
    );
    counter(
        &mut buf,
        "pairlink_pairs_torn_down_total",
        "Pairs torn down",
        snapshot.matching.pairs_torn_down,
    );
    counter(
        &mut buf,
        "pairlink_messages_relayed_total",
        "Chat messages relayed inside pairs",
        snapshot.relay.messages_relayed,
    );
    counter(
        &mut buf,
        "pairlink_messages_rejected_total",
        "Relay operations refused",
        snapshot.relay.messages_rejected,
    );
    counter(
        &mut buf,
        "pairlink_webrtc_offers_total",
        "WebRTC offers relayed",
        snapshot.relay.webrtc_offers,
    );
    counter(
        &mut buf,
        "pairlink_webrtc_answers_total",
        "WebRTC answers relayed",
        snapshot.relay.webrtc_answers,
    );
    counter(
        &mut buf,
        "pairlink_ice_candidates_total",
        "ICE candidates forwarded",
        snapshot.relay.ice_candidates_forwarded,
    );
    counter(
        &mut buf,
        "pairlink_errors_total",
        "Validation and internal errors",
        snapshot.errors.total_errors,
    );

    if let Some(avg) = snapshot.matching.wait_time.average_secs {
        gauge_f64(
            &mut buf,
            "pairlink_match_wait_average_seconds",
            "Average wait before a match",
            avg,
        );
    }
    if let Some(p95) = snapshot.matching.wait_time.p95_secs {
        gauge_f64(
            &mut buf,
            "pairlink_match_wait_p95_seconds",
            "p95 wait before a match",
            p95,
        );
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::server::{ChatServer, ServerConfig};

    #[tokio::test]
    async fn prometheus_rendering_contains_core_series() {
        let server = ChatServer::new(ServerConfig::default(), MatchingConfig::default());
        server.metrics().increment_matches_committed();
        let snapshot = server.metrics().snapshot().await;
        let body = render_prometheus_metrics(&snapshot);

        assert!(body.contains("pairlink_matches_committed_total 1"));
        assert!(body.contains("# TYPE pairlink_connections_total counter"));
    }
}
