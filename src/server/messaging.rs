use std::sync::Arc;

use crate::protocol::{ErrorCode, PeerId, ServerMessage};

use super::ChatServer;

impl ChatServer {
    /// Enqueue a message for a peer. Delivery is best-effort; a full queue
    /// drops the message and bumps a counter.
    pub(crate) fn send_to_peer(&self, peer_id: &PeerId, message: ServerMessage) -> bool {
        self.connection_manager.send_to_peer(peer_id, Arc::new(message))
    }

    /// Enqueue a message for every connected peer.
    pub(crate) fn broadcast_all(&self, message: ServerMessage) {
        self.connection_manager.broadcast(&Arc::new(message));
    }

    /// Send a generic transport-level error event.
    pub(crate) fn send_error_to_peer(
        &self,
        peer_id: &PeerId,
        message: String,
        error_code: Option<ErrorCode>,
    ) {
        self.send_to_peer(
            peer_id,
            ServerMessage::Error {
                message,
                error_code,
            },
        );
    }
}
