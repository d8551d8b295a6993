use std::sync::Arc;

use crate::protocol::{ClientMessage, PeerId};

use super::ChatServer;

impl ChatServer {
    /// Handle one inbound client event. The transport delivers events for a
    /// given peer serially, so handlers never race against themselves.
    ///
    /// Takes the `Arc` receiver because a few handlers arm expiry timers
    /// that outlive the call.
    pub async fn handle_client_message(self: &Arc<Self>, peer_id: &PeerId, message: ClientMessage) {
        // Every inbound event counts as activity for the inactivity sweep.
        self.connection_manager.touch(peer_id);

        match message {
            ClientMessage::Register(payload) => {
                self.handle_register(peer_id, payload).await;
            }
            ClientMessage::Search { mode } => {
                self.handle_search(peer_id, mode).await;
            }
            ClientMessage::CancelSearch => {
                self.handle_cancel_search(peer_id).await;
            }
            ClientMessage::Message { text } => {
                self.handle_chat_message(peer_id, &text).await;
            }
            ClientMessage::Typing => {
                self.handle_typing(peer_id).await;
            }
            ClientMessage::TypingStopped => {
                self.handle_typing_stopped(peer_id).await;
            }
            ClientMessage::Next => {
                self.handle_next(peer_id).await;
            }
            ClientMessage::DisconnectPartner { reason: _ } => {
                self.handle_disconnect_partner(peer_id).await;
            }
            ClientMessage::WebrtcOffer {
                to,
                sdp,
                call_id,
                metadata,
                room_id: _,
            } => {
                self.handle_webrtc_offer(peer_id, to, sdp, call_id, metadata)
                    .await;
            }
            ClientMessage::WebrtcAnswer {
                to,
                sdp,
                call_id,
                room_id: _,
            } => {
                self.handle_webrtc_answer(peer_id, to, sdp, call_id).await;
            }
            ClientMessage::WebrtcIceCandidate { to, candidate } => {
                self.handle_ice_candidate(peer_id, to, candidate).await;
            }
            ClientMessage::WebrtcEnd { to, reason } => {
                self.handle_webrtc_end(peer_id, to, reason).await;
            }
            ClientMessage::WebrtcReject { to, reason } => {
                self.handle_webrtc_reject(peer_id, to, reason).await;
            }
            ClientMessage::VideoCallStatus(payload) => {
                self.relay_opaque(peer_id, OpaqueRelay::VideoCallStatus, payload)
                    .await;
            }
            ClientMessage::CallToggleMedia(payload) => {
                self.relay_opaque(peer_id, OpaqueRelay::CallToggleMedia, payload)
                    .await;
            }
            ClientMessage::ScreenShareStatus(payload) => {
                self.relay_opaque(peer_id, OpaqueRelay::ScreenShareStatus, payload)
                    .await;
            }
            ClientMessage::VideoCallRequest { call_id } => {
                self.handle_video_call_request(peer_id, call_id).await;
            }
            ClientMessage::GetPartnerInfo => {
                self.handle_get_partner_info(peer_id).await;
            }
            ClientMessage::GetStats => {
                self.handle_get_stats(peer_id).await;
            }
            ClientMessage::Heartbeat => {
                self.handle_heartbeat(peer_id);
            }
        }
    }
}

/// Which opaque pass-through event is being relayed.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OpaqueRelay {
    VideoCallStatus,
    CallToggleMedia,
    ScreenShareStatus,
}
