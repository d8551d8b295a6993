use chrono::Utc;

use crate::protocol::{PeerId, ServerMessage};

use super::ChatServer;

impl ChatServer {
    /// Liveness ping. The activity timestamp was already refreshed by the
    /// router, so this only answers back.
    pub(crate) fn handle_heartbeat(&self, peer_id: &PeerId) {
        self.send_to_peer(
            peer_id,
            ServerMessage::HeartbeatResponse {
                timestamp: Utc::now(),
            },
        );
    }
}
