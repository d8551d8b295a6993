use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::config::Config;
use crate::matching::MatchingEngine;
use crate::metrics::ServerMetrics;
use crate::protocol::{PeerId, ServerMessage};

mod call_records;
mod connection_manager;
mod heartbeat;
mod maintenance;
mod message_router;
#[cfg(test)]
mod message_router_tests;
mod messaging;
mod pair_registry;
mod registration;
mod relay;
mod search_service;
mod session_manager;
mod stats;

use call_records::CallRegistry;
use connection_manager::ConnectionManager;
use pair_registry::PairRegistry;
use session_manager::SessionManager;

pub use session_manager::SessionStatus;

/// Pairing and signaling server state. All registries are in-memory and
/// process-local; nothing survives a restart.
pub struct ChatServer {
    /// Outbound senders and per-IP accounting
    connection_manager: ConnectionManager,
    /// Per-peer session state machines
    sessions: SessionManager,
    /// Waiting pool, score index, block list, match history
    matching: MatchingEngine,
    /// Committed pairs keyed by room id
    pairs: PairRegistry,
    /// Call records and pending video-call requests
    calls: CallRegistry,
    /// Server configuration
    config: ServerConfig,
    /// Server metrics
    pub(crate) metrics: Arc<ServerMetrics>,
}

#[derive(Debug, Error)]
pub enum RegisterClientError {
    #[error("Too many connections from your IP ({current}/{limit})")]
    IpLimitExceeded { current: usize, limit: usize },
}

/// Runtime server configuration, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub inactive_threshold: Duration,
    pub cleanup_interval: Duration,
    pub max_wait_time: Duration,
    pub rematch_interval: Duration,
    pub stats_broadcast_interval: Duration,
    pub typing_ttl: Duration,
    pub call_request_ttl: Duration,
    pub recent_message_cap: usize,
    pub max_message_size: usize,
    pub max_connections_per_ip: usize,
    pub outbound_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            inactive_threshold: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            max_wait_time: Duration::from_secs(45),
            rematch_interval: Duration::from_secs(5),
            stats_broadcast_interval: Duration::from_secs(10),
            typing_ttl: Duration::from_secs(3),
            call_request_ttl: Duration::from_secs(30),
            recent_message_cap: 50,
            max_message_size: 65536,
            max_connections_per_ip: 10,
            outbound_queue_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Resolve durations and limits from the loaded configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            inactive_threshold: Duration::from_secs(cfg.server.inactive_threshold_secs),
            cleanup_interval: Duration::from_secs(cfg.server.cleanup_interval_secs),
            max_wait_time: Duration::from_secs(cfg.server.max_wait_time_secs),
            rematch_interval: Duration::from_secs(cfg.server.rematch_interval_secs),
            stats_broadcast_interval: Duration::from_secs(
                cfg.server.stats_broadcast_interval_secs,
            ),
            typing_ttl: Duration::from_secs(cfg.server.typing_ttl_secs),
            call_request_ttl: Duration::from_secs(cfg.server.call_request_ttl_secs),
            recent_message_cap: cfg.server.recent_message_cap,
            max_message_size: cfg.security.max_message_size,
            max_connections_per_ip: cfg.security.max_connections_per_ip,
            outbound_queue_capacity: cfg.websocket.outbound_queue_capacity,
        }
    }
}

impl ChatServer {
    pub fn new(config: ServerConfig, matching_config: crate::config::MatchingConfig) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());

        Arc::new(Self {
            connection_manager: ConnectionManager::new(
                config.max_connections_per_ip,
                metrics.clone(),
            ),
            sessions: SessionManager::new(),
            matching: MatchingEngine::new(matching_config),
            pairs: PairRegistry::new(),
            calls: CallRegistry::new(),
            config,
            metrics,
        })
    }

    /// Register a new client connection. The peer stays `connected` (no
    /// session) until it sends a `register` event.
    pub fn register_client(
        &self,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) -> Result<PeerId, RegisterClientError> {
        self.connection_manager.register_client(sender, client_addr)
    }

    /// Connect a client with a specific peer ID (used for testing)
    pub fn connect_client(&self, peer_id: PeerId, sender: mpsc::Sender<Arc<ServerMessage>>) {
        let addr = "127.0.0.1:0".parse().unwrap();
        self.connection_manager
            .connect_test_client(peer_id, sender, addr);
        tracing::info!(%peer_id, "Client connected");
    }

    /// Tear everything down for a peer after its transport dropped. Never
    /// surfaces an error to the partner beyond `partnerDisconnected`.
    pub async fn unregister_client(&self, peer_id: &PeerId) {
        self.disconnect_peer(peer_id, crate::protocol::TeardownReason::Disconnected)
            .await;
        tracing::info!(%peer_id, "Client unregistered");
    }

    /// Full cleanup for a peer: pair teardown, pool removal, call records,
    /// session, connection slot. Idempotent.
    pub(crate) async fn disconnect_peer(
        &self,
        peer_id: &PeerId,
        reason: crate::protocol::TeardownReason,
    ) {
        // Leave the pool first so no new match proposals include this peer,
        // then dismantle the current pair while the registries still agree.
        self.matching.remove(*peer_id).await;
        self.teardown_pair_for(peer_id, reason).await;

        self.calls.clear_for(peer_id).await;
        self.calls.clear_pending_for(peer_id);

        // Removing the session makes any still-in-flight commit fail its
        // liveness re-check. A commit that won the race just before this
        // point left a partner behind; dismantle that side too.
        if let Some(entry) = self.sessions.remove(peer_id) {
            let (raced_partner, raced_room, session_secs) = {
                let mut state = entry.state.lock().await;
                let partner = state.partner_id;
                let room = state.room_id.clone();
                state.end_chat();
                let session_secs = (chrono::Utc::now() - state.connected_at).num_seconds();
                (partner, room, session_secs)
            };
            if let Some(partner_id) = raced_partner {
                if let Some(room_id) = &raced_room {
                    self.pairs.remove(room_id);
                }
                if let Some(partner_entry) = self.sessions.get(&partner_id) {
                    let mut partner_state = partner_entry.state.lock().await;
                    if partner_state.partner_id == Some(*peer_id) {
                        partner_state.end_chat();
                    }
                }
                self.calls.clear_for(&partner_id).await;
                self.calls.clear_pending_for(&partner_id);
                self.send_to_peer(&partner_id, ServerMessage::PartnerDisconnected { reason });
                self.metrics.increment_pairs_torn_down();
            }
            tracing::debug!(%peer_id, session_secs, "Session destroyed");
        }

        if self.connection_manager.remove_client(peer_id).is_some() {
            self.metrics.decrement_active_connections();
        }
    }

    /// Liveness probe for the health endpoint.
    pub fn health_check(&self) -> bool {
        true
    }

    /// Refresh a peer's activity timestamp without dispatching an event.
    pub fn touch_peer(&self, peer_id: &PeerId) {
        self.connection_manager.touch(peer_id);
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Symmetric block between two peers; neither will be offered the other
    /// again for the lifetime of the process.
    pub async fn block_peer(&self, peer_id: PeerId, other_id: PeerId) {
        self.matching.block(peer_id, other_id).await;
    }

    /// Current session status for a peer, if registered.
    pub async fn session_status(&self, peer_id: &PeerId) -> Option<SessionStatus> {
        let entry = self.sessions.get(peer_id)?;
        let state = entry.state.lock().await;
        Some(state.status)
    }

    /// Partner of a peer, if currently chatting.
    pub async fn partner_of(&self, peer_id: &PeerId) -> Option<PeerId> {
        let entry = self.sessions.get(peer_id)?;
        let state = entry.state.lock().await;
        state.partner_id
    }

    /// Room of a peer, if currently chatting.
    pub async fn room_of(&self, peer_id: &PeerId) -> Option<crate::protocol::RoomId> {
        let entry = self.sessions.get(peer_id)?;
        let state = entry.state.lock().await;
        state.room_id.clone()
    }

    /// Whether a peer is in the waiting pool.
    pub async fn is_waiting(&self, peer_id: &PeerId) -> bool {
        self.matching.contains(*peer_id).await
    }
}
