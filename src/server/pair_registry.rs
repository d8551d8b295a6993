//! Pair commit and teardown.
//!
//! Both operations take the two session locks in sorted order and re-verify
//! state before mutating, so a lost race rolls back silently and repeated
//! teardowns converge on the same terminal state.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::protocol::{
    room_ids, CallId, ChatMode, MatchedPayload, PartnerInfoPayload, PeerId, RoomId, ServerMessage,
    TeardownReason,
};

use super::call_records::CallRecord;
use super::session_manager::{lock_both, SessionStatus};
use super::ChatServer;

/// Undirected pairing of two peers sharing a room.
#[derive(Debug, Clone)]
pub(crate) struct Pair {
    pub peer_a: PeerId,
    pub peer_b: PeerId,
    pub room_id: RoomId,
    pub mode: ChatMode,
    pub created_at: DateTime<Utc>,
    pub call_id: Option<CallId>,
}

pub(crate) struct PairRegistry {
    rooms: DashMap<RoomId, Pair>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn insert(&self, pair: Pair) {
        self.rooms.insert(pair.room_id.clone(), pair);
    }

    pub fn get(&self, room_id: &RoomId) -> Option<Pair> {
        self.rooms.get(room_id).map(|pair| pair.clone())
    }

    pub fn remove(&self, room_id: &RoomId) -> Option<Pair> {
        self.rooms.remove(room_id).map(|(_, pair)| pair)
    }

    pub fn set_call(&self, room_id: &RoomId, call_id: CallId) {
        if let Some(mut pair) = self.rooms.get_mut(room_id) {
            pair.call_id = Some(call_id);
        }
    }

    pub fn clear_call(&self, room_id: &RoomId) {
        if let Some(mut pair) = self.rooms.get_mut(room_id) {
            pair.call_id = None;
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

impl ChatServer {
    /// Commit a pairing between two searching peers.
    ///
    /// Re-verifies both sessions under their locks; a peer that got paired,
    /// cancelled, or disconnected in the meantime fails the commit and the
    /// matching engine is free to try another candidate on the next sweep.
    /// Both peers leave the waiting pool inside the critical section.
    pub(crate) async fn commit_pair(&self, a_id: PeerId, b_id: PeerId, score: f64) -> bool {
        if a_id == b_id {
            return false;
        }
        let (Some(a_entry), Some(b_entry)) = (self.sessions.get(&a_id), self.sessions.get(&b_id))
        else {
            return false;
        };

        let (mut a, mut b) = lock_both(&a_entry, &b_entry, a_id, b_id).await;

        // The entries must still be the registered sessions; a peer that
        // disconnected between lookup and lock fails the commit.
        let a_live = self
            .sessions
            .get(&a_id)
            .is_some_and(|entry| std::sync::Arc::ptr_eq(&entry, &a_entry));
        let b_live = self
            .sessions
            .get(&b_id)
            .is_some_and(|entry| std::sync::Arc::ptr_eq(&entry, &b_entry));
        let a_ok = a.status == SessionStatus::Searching && a.partner_id.is_none();
        let b_ok = b.status == SessionStatus::Searching && b.partner_id.is_none();
        if !a_live || !b_live || !a_ok || !b_ok {
            self.metrics.increment_match_commit_conflicts();
            return false;
        }
        // Mode strictness, re-checked at the commit boundary
        if a.profile.chat_mode != b.profile.chat_mode {
            self.metrics.increment_match_commit_conflicts();
            return false;
        }

        let mode = a.profile.chat_mode;
        let room_id = room_ids::generate_room_id();
        let now = Utc::now();

        let a_wait = a.search_started.map(|s| s.elapsed());
        let b_wait = b.search_started.map(|s| s.elapsed());
        let shared_interests = a.profile.shared_interests(&b.profile);

        let a_info = partner_info(a_id, &a.profile);
        let b_info = partner_info(b_id, &b.profile);
        let auto_start = mode == ChatMode::Video && a.auto_connect && b.auto_connect;

        a.begin_chat(b_id, room_id.clone());
        b.begin_chat(a_id, room_id.clone());

        // Pool removal is part of the commit: both peers disappear from the
        // engine before the locks drop, so no concurrent find_match can
        // offer either of them again.
        self.matching.remove(a_id).await;
        self.matching.remove(b_id).await;
        self.matching.record_match(a_id, b_id).await;

        let call_id = (mode == ChatMode::Video).then(CallId::new_v4);
        self.pairs.insert(Pair {
            peer_a: a_id,
            peer_b: b_id,
            room_id: room_id.clone(),
            mode,
            created_at: now,
            call_id,
        });
        if let Some(call_id) = call_id {
            self.calls
                .insert(CallRecord::new(call_id, room_id.clone(), a_id, b_id));
        }

        drop(a);
        drop(b);

        self.metrics.increment_matches_committed();
        if let Some(wait) = a_wait {
            self.metrics.record_wait_time(wait).await;
        }
        if let Some(wait) = b_wait {
            self.metrics.record_wait_time(wait).await;
        }

        self.send_to_peer(
            &a_id,
            ServerMessage::Matched(Box::new(MatchedPayload {
                room_id: room_id.clone(),
                partner: b_info,
                compatibility: score,
                shared_interests: shared_interests.clone(),
                match_mode: mode,
                timestamp: now,
            })),
        );
        self.send_to_peer(
            &b_id,
            ServerMessage::Matched(Box::new(MatchedPayload {
                room_id: room_id.clone(),
                partner: a_info,
                compatibility: score,
                shared_interests,
                match_mode: mode,
                timestamp: now,
            })),
        );

        if let Some(call_id) = call_id {
            for peer in [&a_id, &b_id] {
                self.send_to_peer(
                    peer,
                    ServerMessage::VideoMatchReady {
                        room_id: room_id.clone(),
                        call_id,
                    },
                );
            }
            if auto_start {
                for peer in [&a_id, &b_id] {
                    self.send_to_peer(
                        peer,
                        ServerMessage::VideoCallAutoStart {
                            room_id: room_id.clone(),
                            call_id,
                        },
                    );
                }
            }
        }

        tracing::info!(
            peer_a = %a_id,
            peer_b = %b_id,
            %room_id,
            %mode,
            compatibility = score,
            "Pair committed"
        );
        true
    }

    /// Tear down the pair the peer is in, if any. Returns true when a pair
    /// was actually dismantled. Repeating the call is harmless.
    ///
    /// The partner is notified with `partnerDisconnected` — including when
    /// the reason is the initiator's own transport drop; only the dropped
    /// side itself hears nothing.
    pub(crate) async fn teardown_pair_for(
        &self,
        initiator: &PeerId,
        reason: TeardownReason,
    ) -> bool {
        let Some(init_entry) = self.sessions.get(initiator) else {
            return false;
        };

        let partner_id = {
            let state = init_entry.state.lock().await;
            state.partner_id
        };
        let Some(partner_id) = partner_id else {
            return false;
        };

        let room_id = match self.sessions.get(&partner_id) {
            Some(partner_entry) => {
                let (mut init_state, mut partner_state) =
                    lock_both(&init_entry, &partner_entry, *initiator, partner_id).await;

                // Re-verify after acquiring both locks; another teardown may
                // have won the race.
                if init_state.partner_id != Some(partner_id) {
                    return false;
                }

                let room_id = init_state.room_id.clone();
                init_state.end_chat();
                if partner_state.partner_id == Some(*initiator) {
                    partner_state.end_chat();
                }
                room_id
            }
            None => {
                // Partner session is already gone; clear our own side only.
                let mut state = init_entry.state.lock().await;
                if state.partner_id != Some(partner_id) {
                    return false;
                }
                let room_id = state.room_id.clone();
                state.end_chat();
                room_id
            }
        };

        if let Some(room_id) = &room_id {
            if let Some(pair) = self.pairs.remove(room_id) {
                let chat_secs = (Utc::now() - pair.created_at).num_seconds();
                tracing::debug!(
                    peer_a = %pair.peer_a,
                    peer_b = %pair.peer_b,
                    mode = %pair.mode,
                    chat_secs,
                    "Room destroyed"
                );
            }
        }
        self.calls.clear_for(initiator).await;
        self.calls.clear_for(&partner_id).await;
        self.calls.clear_pending_for(initiator);
        self.calls.clear_pending_for(&partner_id);
        self.matching.remove(*initiator).await;
        self.matching.remove(partner_id).await;

        self.send_to_peer(&partner_id, ServerMessage::PartnerDisconnected { reason });

        self.metrics.increment_pairs_torn_down();
        tracing::info!(
            initiator = %initiator,
            partner = %partner_id,
            room_id = room_id.as_deref().unwrap_or("unknown"),
            %reason,
            "Pair torn down"
        );
        true
    }
}

/// Public profile subset shared with the other side of a pair.
pub(crate) fn partner_info(
    peer_id: PeerId,
    profile: &crate::protocol::Profile,
) -> PartnerInfoPayload {
    PartnerInfoPayload {
        peer_id,
        username: profile.username.clone(),
        gender: profile.gender,
        age: profile.age,
        interests: profile.interests.iter().cloned().collect(),
    }
}
