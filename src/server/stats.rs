//! Live counts, broadcast periodically and served on request.

use std::sync::Arc;

use chrono::Utc;

use crate::protocol::{PeerId, ServerMessage, StatsPayload};

use super::pair_registry::partner_info;
use super::session_manager::SessionStatus;
use super::ChatServer;

impl ChatServer {
    /// Assemble the live counters from every owning component.
    pub async fn stats_snapshot(&self) -> StatsPayload {
        let engine = self.matching.stats().await;

        StatsPayload {
            online_peers: self.connection_manager.client_count(),
            searching_peers: engine.waiting,
            active_pairs: self.pairs.len(),
            active_calls: self.calls.active_call_count().await,
            waiting_call_requests: self.calls.pending_count(),
            typing_peers: self.sessions.typing_count(),
            avg_wait_secs: engine.avg_wait_secs,
            avg_search_attempts: engine.avg_attempts,
            timestamp: Utc::now(),
        }
    }

    pub(crate) async fn handle_get_stats(&self, peer_id: &PeerId) {
        let payload = self.stats_snapshot().await;
        self.send_to_peer(peer_id, ServerMessage::Stats(payload));
    }

    /// Current partner profile, or `null` when unpaired.
    pub(crate) async fn handle_get_partner_info(&self, peer_id: &PeerId) {
        let partner = 'resolve: {
            let Some(entry) = self.sessions.get(peer_id) else {
                break 'resolve None;
            };
            let (partner_id, room_id) = {
                let state = entry.state.lock().await;
                if state.status != SessionStatus::Chatting {
                    break 'resolve None;
                }
                match (state.partner_id, state.room_id.clone()) {
                    (Some(partner_id), Some(room_id)) => (partner_id, room_id),
                    _ => break 'resolve None,
                }
            };
            let Some(partner_entry) = self.sessions.get(&partner_id) else {
                break 'resolve None;
            };
            let partner_state = partner_entry.state.lock().await;
            Some((
                partner_info(partner_id, &partner_state.profile),
                room_id,
            ))
        };

        let message = match partner {
            Some((partner, room_id)) => ServerMessage::PartnerInfo {
                partner: Some(partner),
                room_id: Some(room_id),
            },
            None => ServerMessage::PartnerInfo {
                partner: None,
                room_id: None,
            },
        };
        self.send_to_peer(peer_id, message);
    }

    /// Periodic `stats-updated` broadcast to every connected peer.
    pub async fn stats_broadcast_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.stats_broadcast_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let payload = self.stats_snapshot().await;
            self.broadcast_all(ServerMessage::StatsUpdated(payload));
        }
    }
}
