//! Pair-scoped signaling relay.
//!
//! Chat text, typing indicators, and WebRTC traffic only ever move between
//! the two ends of a live pair. Every handler re-checks the pairing at
//! dispatch time; a mis-targeted event earns the sender a typed error (or a
//! silent refusal for fire-and-forget indicators) and the named target hears
//! nothing at all.

use std::sync::Arc;

use chrono::Utc;

use crate::protocol::validation::{normalize_message_text, MessageTextError};
use crate::protocol::{
    CallId, CallStatus, ChatMessagePayload, ErrorCode, PeerId, RoomId, ServerMessage,
};

use super::call_records::{CallRecord, PendingCallRequest};
use super::message_router::OpaqueRelay;
use super::session_manager::{lock_both, SessionStatus};
use super::ChatServer;

impl ChatServer {
    /// Verify `from` and `to` are the two ends of one live pair, under both
    /// session locks. Returns the shared room id.
    pub(crate) async fn verify_pairing(&self, from: &PeerId, to: &PeerId) -> Option<RoomId> {
        if from == to {
            return None;
        }
        let from_entry = self.sessions.get(from)?;
        let to_entry = self.sessions.get(to)?;

        let (from_state, to_state) = lock_both(&from_entry, &to_entry, *from, *to).await;
        if from_state.is_chatting_with(to)
            && to_state.is_chatting_with(from)
            && from_state.room_id == to_state.room_id
        {
            from_state.room_id.clone()
        } else {
            None
        }
    }

    /// The sender's current partner and room, checked under its own lock.
    async fn current_partner(&self, from: &PeerId) -> Option<(PeerId, RoomId)> {
        let entry = self.sessions.get(from)?;
        let state = entry.state.lock().await;
        if state.status != SessionStatus::Chatting {
            return None;
        }
        Some((state.partner_id?, state.room_id.clone()?))
    }

    fn send_webrtc_error(&self, peer_id: &PeerId, error_code: ErrorCode) {
        self.metrics.increment_messages_rejected();
        self.send_to_peer(
            peer_id,
            ServerMessage::WebrtcError {
                message: error_code.description().to_string(),
                error_code,
            },
        );
    }

    /// Relay a chat message to the partner: trimmed, capped, server-stamped.
    pub(crate) async fn handle_chat_message(&self, peer_id: &PeerId, text: &str) {
        let Some(entry) = self.sessions.get(peer_id) else {
            self.send_message_error(peer_id, ErrorCode::NotRegistered);
            return;
        };

        let (partner_id, payload) = {
            let mut state = entry.state.lock().await;
            if state.status != SessionStatus::Chatting {
                drop(state);
                self.send_message_error(peer_id, ErrorCode::NotPaired);
                return;
            }
            let Some(partner_id) = state.partner_id else {
                drop(state);
                self.send_message_error(peer_id, ErrorCode::NotPaired);
                return;
            };

            let text = match normalize_message_text(text) {
                Ok(text) => text,
                Err(MessageTextError::Empty) => {
                    drop(state);
                    self.send_message_error(peer_id, ErrorCode::EmptyMessage);
                    return;
                }
                Err(MessageTextError::TooLong) => {
                    drop(state);
                    self.send_message_error(peer_id, ErrorCode::MessageTooLarge);
                    return;
                }
            };

            let payload = ChatMessagePayload {
                id: uuid::Uuid::new_v4(),
                from: *peer_id,
                username: state.profile.username.clone(),
                text,
                timestamp: Utc::now(),
            };
            state.push_recent_message(payload.clone(), self.config.recent_message_cap);
            (partner_id, payload)
        };

        let id = payload.id;
        let timestamp = payload.timestamp;
        self.send_to_peer(&partner_id, ServerMessage::Message(payload));
        self.send_to_peer(peer_id, ServerMessage::MessageSent { id, timestamp });
        self.metrics.increment_messages_relayed();
    }

    fn send_message_error(&self, peer_id: &PeerId, error_code: ErrorCode) {
        self.metrics.increment_messages_rejected();
        self.send_to_peer(
            peer_id,
            ServerMessage::MessageError {
                message: error_code.description().to_string(),
                error_code,
            },
        );
    }

    /// Mark the sender as typing and arm the expiry timer. Only the
    /// transition into "typing" is forwarded; the partner hears
    /// `partnerTypingStopped` when the timer lapses or on an explicit stop.
    pub(crate) async fn handle_typing(self: &Arc<Self>, peer_id: &PeerId) {
        let Some(entry) = self.sessions.get(peer_id) else {
            return;
        };

        let (partner_id, generation, newly_active) = {
            let mut state = entry.state.lock().await;
            if state.status != SessionStatus::Chatting {
                return;
            }
            let Some(partner_id) = state.partner_id else {
                return;
            };
            let newly_active = !state.typing_active;
            state.typing_active = true;
            state.typing_generation = state.typing_generation.wrapping_add(1);
            (partner_id, state.typing_generation, newly_active)
        };

        self.metrics.increment_typing_events();
        if newly_active {
            self.send_to_peer(&partner_id, ServerMessage::PartnerTyping);
        }

        let server = Arc::clone(self);
        let peer = *peer_id;
        let ttl = self.config.typing_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            server.expire_typing(peer, generation).await;
        });
    }

    /// Clear typing state if no newer keystroke superseded this timer.
    async fn expire_typing(&self, peer_id: PeerId, generation: u64) {
        let Some(entry) = self.sessions.get(&peer_id) else {
            return;
        };
        let partner_id = {
            let mut state = entry.state.lock().await;
            if !state.typing_active || state.typing_generation != generation {
                return;
            }
            state.typing_active = false;
            state.partner_id
        };
        if let Some(partner_id) = partner_id {
            self.send_to_peer(&partner_id, ServerMessage::PartnerTypingStopped);
        }
    }

    pub(crate) async fn handle_typing_stopped(&self, peer_id: &PeerId) {
        let Some(entry) = self.sessions.get(peer_id) else {
            return;
        };
        let partner_id = {
            let mut state = entry.state.lock().await;
            if !state.typing_active {
                return;
            }
            state.typing_active = false;
            state.typing_generation = state.typing_generation.wrapping_add(1);
            state.partner_id
        };
        if let Some(partner_id) = partner_id {
            self.send_to_peer(&partner_id, ServerMessage::PartnerTypingStopped);
        }
    }

    /// Relay a WebRTC offer inside the pair, creating or refreshing the call
    /// record. The SDP is never inspected.
    pub(crate) async fn handle_webrtc_offer(
        &self,
        peer_id: &PeerId,
        to: PeerId,
        sdp: String,
        call_id: Option<CallId>,
        metadata: Option<serde_json::Value>,
    ) {
        let Some(room_id) = self.verify_pairing(peer_id, &to).await else {
            self.send_webrtc_error(peer_id, ErrorCode::NotPaired);
            return;
        };

        // Reuse the call id allocated at match time (or in a preceding
        // video-call request) when the client did not supply one.
        let call_id = call_id
            .or_else(|| self.pairs.get(&room_id).and_then(|pair| pair.call_id))
            .unwrap_or_else(CallId::new_v4);

        // An offer supersedes any still-pending out-of-band request for it.
        if let Some(request) = self.calls.pending_for(&to) {
            if request.from == *peer_id && self.calls.expire_pending(&to, request.call_id) {
                tracing::debug!(
                    %to,
                    elapsed = ?request.created_at.elapsed(),
                    "Pending call request superseded by offer"
                );
            }
        }

        match self.calls.get(peer_id) {
            Some(record) => {
                let mut record = record.lock().await;
                record.call_id = call_id;
                record.room_id = room_id.clone();
                record.caller = *peer_id;
                record.callee = to;
                record.status = CallStatus::Offered;
                record.sdp = Some(sdp.clone());
                record.metadata = metadata.clone();
            }
            None => {
                let mut record = CallRecord::new(call_id, room_id.clone(), *peer_id, to);
                record.status = CallStatus::Offered;
                record.sdp = Some(sdp.clone());
                record.metadata = metadata.clone();
                self.calls.insert(record);
            }
        }
        self.pairs.set_call(&room_id, call_id);

        self.send_to_peer(
            &to,
            ServerMessage::WebrtcOffer {
                from: *peer_id,
                sdp,
                call_id,
                room_id,
                metadata,
            },
        );
        self.metrics.increment_webrtc_offers();
    }

    /// Relay a WebRTC answer back to the caller. If the relay never saw the
    /// offer, a record is synthesized so the call still has bookkeeping.
    pub(crate) async fn handle_webrtc_answer(
        &self,
        peer_id: &PeerId,
        to: PeerId,
        sdp: String,
        call_id: CallId,
    ) {
        let Some(room_id) = self.verify_pairing(peer_id, &to).await else {
            self.send_webrtc_error(peer_id, ErrorCode::NotPaired);
            return;
        };

        match self.calls.get(peer_id) {
            Some(record) => {
                let mut record = record.lock().await;
                record.status = CallStatus::Answered;
                record.answer_sdp = Some(sdp.clone());
                record.answered_at = Some(Utc::now());
            }
            None => {
                let mut record = CallRecord::new(call_id, room_id.clone(), to, *peer_id);
                record.status = CallStatus::Answered;
                record.answer_sdp = Some(sdp.clone());
                record.answered_at = Some(Utc::now());
                self.calls.insert(record);
                self.pairs.set_call(&room_id, call_id);
            }
        }

        self.send_to_peer(
            &to,
            ServerMessage::WebrtcAnswer {
                from: *peer_id,
                sdp,
                call_id,
                room_id,
            },
        );
        self.metrics.increment_webrtc_answers();
    }

    /// Forward an ICE candidate without inspection. Replays are harmless.
    pub(crate) async fn handle_ice_candidate(
        &self,
        peer_id: &PeerId,
        to: PeerId,
        candidate: serde_json::Value,
    ) {
        if self.verify_pairing(peer_id, &to).await.is_none() {
            self.send_webrtc_error(peer_id, ErrorCode::NotPaired);
            return;
        }

        self.send_to_peer(
            &to,
            ServerMessage::WebrtcIceCandidate {
                from: *peer_id,
                candidate,
            },
        );
        self.metrics.increment_ice_candidates_forwarded();
    }

    /// End the current call. The pair itself stays alive — only the call
    /// record and the room's call id go away.
    pub(crate) async fn handle_webrtc_end(
        &self,
        peer_id: &PeerId,
        to: PeerId,
        reason: Option<String>,
    ) {
        let Some(room_id) = self.verify_pairing(peer_id, &to).await else {
            self.send_webrtc_error(peer_id, ErrorCode::NotPaired);
            return;
        };

        if let Some(record) = self.calls.get(peer_id) {
            let mut record = record.lock().await;
            record.status = CallStatus::Ended;
            record.ended_at = Some(Utc::now());
            tracing::debug!(
                call_id = %record.call_id,
                room_id = %record.room_id,
                had_offer = record.sdp.is_some(),
                had_answer = record.answer_sdp.is_some(),
                had_metadata = record.metadata.is_some(),
                "Call ended"
            );
        }
        self.calls.clear_for(peer_id).await;
        self.calls.clear_for(&to).await;
        self.calls.clear_pending_for(peer_id);
        self.calls.clear_pending_for(&to);
        self.pairs.clear_call(&room_id);

        self.send_to_peer(
            &to,
            ServerMessage::WebrtcEnd {
                from: *peer_id,
                reason,
            },
        );
        self.metrics.increment_calls_ended();
    }

    /// Reject an incoming call. As with `end`, the pair survives.
    pub(crate) async fn handle_webrtc_reject(&self, peer_id: &PeerId, to: PeerId, reason: String) {
        let Some(room_id) = self.verify_pairing(peer_id, &to).await else {
            self.send_webrtc_error(peer_id, ErrorCode::NotPaired);
            return;
        };

        if let Some(record) = self.calls.get(peer_id) {
            let mut record = record.lock().await;
            record.status = CallStatus::Rejected;
            record.ended_at = Some(Utc::now());
        }
        self.calls.clear_for(peer_id).await;
        self.calls.clear_for(&to).await;
        self.calls.clear_pending_for(peer_id);
        self.calls.clear_pending_for(&to);
        self.pairs.clear_call(&room_id);

        self.send_to_peer(
            &to,
            ServerMessage::WebrtcReject {
                from: *peer_id,
                reason,
            },
        );
        self.metrics.increment_calls_rejected();
    }

    /// Opaque pass-through events: forwarded to the current partner, dropped
    /// silently when there is none.
    pub(crate) async fn relay_opaque(
        &self,
        peer_id: &PeerId,
        kind: OpaqueRelay,
        payload: serde_json::Value,
    ) {
        let Some((partner_id, _)) = self.current_partner(peer_id).await else {
            return;
        };

        let message = match kind {
            OpaqueRelay::VideoCallStatus => ServerMessage::VideoCallStatus {
                from: *peer_id,
                payload,
            },
            OpaqueRelay::CallToggleMedia => ServerMessage::CallToggleMedia {
                from: *peer_id,
                payload,
            },
            OpaqueRelay::ScreenShareStatus => ServerMessage::ScreenShareStatus {
                from: *peer_id,
                payload,
            },
        };
        self.send_to_peer(&partner_id, message);
    }

    /// Out-of-band video-call request: stored with a TTL, relayed to the
    /// partner, and auto-expired if nobody follows up with an offer.
    pub(crate) async fn handle_video_call_request(
        self: &Arc<Self>,
        peer_id: &PeerId,
        call_id: Option<CallId>,
    ) {
        let Some((partner_id, room_id)) = self.current_partner(peer_id).await else {
            self.send_webrtc_error(peer_id, ErrorCode::NotPaired);
            return;
        };

        let call_id = call_id
            .or_else(|| self.pairs.get(&room_id).and_then(|pair| pair.call_id))
            .unwrap_or_else(CallId::new_v4);

        // Book-keep the request as an incoming call on the partner's side.
        match self.calls.get(peer_id) {
            Some(record) => {
                let mut record = record.lock().await;
                record.call_id = call_id;
                record.status = CallStatus::Incoming;
            }
            None => {
                let mut record = CallRecord::new(call_id, room_id, *peer_id, partner_id);
                record.status = CallStatus::Incoming;
                self.calls.insert(record);
            }
        }

        self.calls.insert_pending(
            partner_id,
            PendingCallRequest {
                call_id,
                from: *peer_id,
                created_at: std::time::Instant::now(),
            },
        );

        self.send_to_peer(
            &partner_id,
            ServerMessage::VideoCallRequest {
                from: *peer_id,
                call_id,
            },
        );

        let server = Arc::clone(self);
        let ttl = self.config.call_request_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if server.calls.expire_pending(&partner_id, call_id) {
                server.metrics.increment_call_requests_expired();
                tracing::debug!(%partner_id, %call_id, "Video call request expired");
            }
        });
    }
}
