//! Per-peer session state machine.
//!
//! A session exists from `register` until disconnect. Its mutable state
//! lives behind a per-session async mutex; every inbound event for a peer is
//! processed serially by the transport, and two-peer operations (pair
//! commit, teardown, relay checks) take both session locks in sorted
//! `PeerId` order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::protocol::{ChatMessagePayload, PeerId, Profile, RoomId};

/// Session lifecycle status.
///
/// Invariant: `Chatting` iff `partner_id` and `room_id` are both set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Registered, idle
    Ready,
    /// In the waiting pool
    Searching,
    /// Paired with a partner
    Chatting,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub profile: Profile,
    pub status: SessionStatus,
    pub partner_id: Option<PeerId>,
    pub room_id: Option<RoomId>,
    pub search_started: Option<Instant>,
    /// Incremented on `next`; feeds the scorer's behavior term.
    pub attempts: u32,
    pub auto_connect: bool,
    pub connected_at: DateTime<Utc>,
    pub typing_active: bool,
    /// Bumps on every typing event so a stale expiry timer can tell it lost.
    pub typing_generation: u64,
    /// Best-effort recent message retention, pair lifetime only.
    pub recent_messages: VecDeque<ChatMessagePayload>,
}

impl SessionState {
    fn new(profile: Profile, auto_connect: bool) -> Self {
        Self {
            profile,
            status: SessionStatus::Ready,
            partner_id: None,
            room_id: None,
            search_started: None,
            attempts: 0,
            auto_connect,
            connected_at: Utc::now(),
            typing_active: false,
            typing_generation: 0,
            recent_messages: VecDeque::new(),
        }
    }

    pub fn is_chatting_with(&self, partner: &PeerId) -> bool {
        self.status == SessionStatus::Chatting && self.partner_id.as_ref() == Some(partner)
    }

    /// Transition into `Chatting`. Caller must hold the lock and have
    /// verified the peer was `Searching` and unpaired.
    pub fn begin_chat(&mut self, partner_id: PeerId, room_id: RoomId) {
        self.status = SessionStatus::Chatting;
        self.partner_id = Some(partner_id);
        self.room_id = Some(room_id);
        self.search_started = None;
    }

    /// Transition out of `Chatting` back to `Ready`, dropping everything
    /// scoped to the pair. Safe to call in any state.
    pub fn end_chat(&mut self) {
        self.status = SessionStatus::Ready;
        self.partner_id = None;
        self.room_id = None;
        self.typing_active = false;
        self.typing_generation = self.typing_generation.wrapping_add(1);
        self.recent_messages.clear();
    }

    /// Record a relayed message, evicting the oldest beyond `cap`.
    pub fn push_recent_message(&mut self, message: ChatMessagePayload, cap: usize) {
        if cap == 0 {
            return;
        }
        while self.recent_messages.len() >= cap {
            self.recent_messages.pop_front();
        }
        self.recent_messages.push_back(message);
    }
}

pub(crate) struct SessionEntry {
    pub state: Mutex<SessionState>,
}

pub(crate) struct SessionManager {
    sessions: DashMap<PeerId, Arc<SessionEntry>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create a session. Returns `None` when the peer already registered one.
    pub fn insert(
        &self,
        peer_id: PeerId,
        profile: Profile,
        auto_connect: bool,
    ) -> Option<Arc<SessionEntry>> {
        match self.sessions.entry(peer_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let entry = Arc::new(SessionEntry {
                    state: Mutex::new(SessionState::new(profile, auto_connect)),
                });
                slot.insert(entry.clone());
                Some(entry)
            }
        }
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<SessionEntry>> {
        self.sessions.get(peer_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, peer_id: &PeerId) -> Option<Arc<SessionEntry>> {
        self.sessions.remove(peer_id).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Count sessions whose typing indicator is currently active. Uses
    /// `try_lock` so the sweep never stalls behind a busy session.
    pub fn typing_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| {
                entry
                    .state
                    .try_lock()
                    .map(|state| state.typing_active)
                    .unwrap_or(false)
            })
            .count()
    }
}

/// Acquire two session locks in globally consistent (sorted `PeerId`) order,
/// returning the guards in argument order. The ids must be distinct.
pub(crate) async fn lock_both<'a>(
    first: &'a SessionEntry,
    second: &'a SessionEntry,
    first_id: PeerId,
    second_id: PeerId,
) -> (MutexGuard<'a, SessionState>, MutexGuard<'a, SessionState>) {
    debug_assert_ne!(first_id, second_id);
    if first_id < second_id {
        let first_guard = first.state.lock().await;
        let second_guard = second.state.lock().await;
        (first_guard, second_guard)
    } else {
        let second_guard = second.state.lock().await;
        let first_guard = first.state.lock().await;
        (first_guard, second_guard)
    }
}
