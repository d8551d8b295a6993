use crate::protocol::{validation, ErrorCode, PeerId, RegisterPayload, ServerMessage};

use super::ChatServer;

impl ChatServer {
    /// Create a session for a connected peer. The profile is normalized
    /// before anything is stored; a malformed payload changes nothing.
    pub(crate) async fn handle_register(&self, peer_id: &PeerId, payload: RegisterPayload) {
        if !self.connection_manager.has_client(peer_id) {
            return;
        }

        let auto_connect = payload.auto_connect;
        let profile = match validation::normalize_profile(payload) {
            Ok(profile) => profile,
            Err(reason) => {
                self.metrics.increment_validation_errors();
                self.send_to_peer(
                    peer_id,
                    ServerMessage::RegisterError {
                        message: reason,
                        error_code: ErrorCode::InvalidProfile,
                    },
                );
                return;
            }
        };

        let username = profile.username.clone();
        if self
            .sessions
            .insert(*peer_id, profile.clone(), auto_connect)
            .is_none()
        {
            self.send_to_peer(
                peer_id,
                ServerMessage::RegisterError {
                    message: ErrorCode::AlreadyRegistered.description().to_string(),
                    error_code: ErrorCode::AlreadyRegistered,
                },
            );
            return;
        }

        self.metrics.increment_registrations();
        tracing::info!(%peer_id, %username, "Peer registered");

        self.send_to_peer(
            peer_id,
            ServerMessage::Registered {
                peer_id: *peer_id,
                profile,
            },
        );
    }
}
