//! Search lifecycle: entering and leaving the waiting pool, the periodic
//! rematch sweep, and search timeouts.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::matching::PeerSnapshot;
use crate::protocol::{ChatMode, ErrorCode, PeerId, ServerMessage, TeardownReason};

use super::session_manager::SessionStatus;
use super::ChatServer;

impl ChatServer {
    /// Enter the waiting pool, optionally re-setting the chat mode. A peer
    /// already chatting is torn down first (`new_search`), exactly as if it
    /// had walked away.
    pub(crate) async fn handle_search(&self, peer_id: &PeerId, mode: Option<ChatMode>) {
        let Some(entry) = self.sessions.get(peer_id) else {
            self.send_to_peer(
                peer_id,
                ServerMessage::SearchError {
                    message: ErrorCode::NotRegistered.description().to_string(),
                    error_code: ErrorCode::NotRegistered,
                },
            );
            return;
        };

        let status = {
            let state = entry.state.lock().await;
            state.status
        };
        if status == SessionStatus::Chatting {
            self.teardown_pair_for(peer_id, TeardownReason::NewSearch).await;
        }

        self.enter_pool(peer_id, mode).await;
    }

    /// Leave the waiting pool. A peer that is not searching is left alone —
    /// `register` followed by `cancel-search` keeps the session `ready`.
    pub(crate) async fn handle_cancel_search(&self, peer_id: &PeerId) {
        let Some(entry) = self.sessions.get(peer_id) else {
            return;
        };

        {
            let mut state = entry.state.lock().await;
            if state.status != SessionStatus::Searching {
                return;
            }
            state.status = SessionStatus::Ready;
            state.search_started = None;
        }

        self.matching.remove(*peer_id).await;
        self.metrics.increment_searches_cancelled();
        self.send_to_peer(peer_id, ServerMessage::SearchCancelled);
    }

    /// Leave the current pair and immediately re-enter the pool with the
    /// same profile and an incremented attempt count.
    pub(crate) async fn handle_next(&self, peer_id: &PeerId) {
        let Some(entry) = self.sessions.get(peer_id) else {
            return;
        };

        if !self
            .teardown_pair_for(peer_id, TeardownReason::NextRequested)
            .await
        {
            // Not in a pair; nothing to skip past.
            return;
        }

        {
            let mut state = entry.state.lock().await;
            state.attempts = state.attempts.saturating_add(1);
        }

        self.enter_pool(peer_id, None).await;
    }

    /// Leave the current pair and stay idle.
    pub(crate) async fn handle_disconnect_partner(&self, peer_id: &PeerId) {
        self.teardown_pair_for(peer_id, TeardownReason::ManualDisconnect)
            .await;
    }

    /// Shared pool entry: flips the session to `Searching`, snapshots the
    /// profile into the engine, and tries an immediate match.
    async fn enter_pool(&self, peer_id: &PeerId, mode: Option<ChatMode>) {
        let Some(entry) = self.sessions.get(peer_id) else {
            return;
        };

        let snapshot = {
            let mut state = entry.state.lock().await;
            match state.status {
                SessionStatus::Searching => {
                    self.send_to_peer(
                        peer_id,
                        ServerMessage::SearchError {
                            message: ErrorCode::AlreadySearching.description().to_string(),
                            error_code: ErrorCode::AlreadySearching,
                        },
                    );
                    return;
                }
                // A concurrent commit can slip in between the teardown and
                // this lock; leave the fresh pair alone.
                SessionStatus::Chatting => return,
                SessionStatus::Ready => {}
            }

            if let Some(mode) = mode {
                state.profile.chat_mode = mode;
            }
            state.status = SessionStatus::Searching;
            let now = Instant::now();
            state.search_started = Some(now);

            PeerSnapshot {
                peer_id: *peer_id,
                profile: state.profile.clone(),
                joined_at: now,
                attempts: state.attempts,
            }
        };

        let mode = snapshot.profile.chat_mode;
        self.matching.add(snapshot).await;
        self.metrics.increment_searches_started();

        self.send_to_peer(
            peer_id,
            ServerMessage::Searching {
                mode,
                timestamp: Utc::now(),
            },
        );

        self.try_match_now(peer_id).await;
    }

    /// One immediate match attempt. Safe to call for peers that have since
    /// left the pool; `find_match` is a no-op for them.
    pub(crate) async fn try_match_now(&self, peer_id: &PeerId) {
        if let Some(candidate) = self.matching.find_match(*peer_id).await {
            self.commit_pair(*peer_id, candidate.peer_id, candidate.score)
                .await;
        }
    }

    /// Periodic rematch loop. One sweeper covers every searching peer, so
    /// thousands of peers do not each carry their own timer.
    pub async fn rematch_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.rematch_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.run_rematch_sweep().await;
        }
    }

    /// One pass over the waiting pool: expire timed-out searches, retry the
    /// rest, and report progress to those still waiting. Public so tests can
    /// drive the loop deterministically.
    pub async fn run_rematch_sweep(&self) {
        let searching = self.matching.searching_peers().await;
        let pool_size = searching.len();

        for (peer_id, joined_at, attempts) in searching {
            let waited = joined_at.elapsed();
            if waited >= self.config.max_wait_time {
                self.expire_search(&peer_id, waited.as_secs()).await;
                continue;
            }

            if let Some(candidate) = self.matching.find_match(peer_id).await {
                if self
                    .commit_pair(peer_id, candidate.peer_id, candidate.score)
                    .await
                {
                    continue;
                }
            }

            // The peer may have been paired by the partner's iteration in
            // this same sweep; only report progress to peers still waiting.
            if self.matching.contains(peer_id).await {
                self.send_to_peer(
                    &peer_id,
                    ServerMessage::SearchingUpdate {
                        waited_secs: waited.as_secs(),
                        pool_size,
                        attempts,
                    },
                );
            }
        }
    }

    async fn expire_search(&self, peer_id: &PeerId, waited_secs: u64) {
        self.matching.remove(*peer_id).await;

        if let Some(entry) = self.sessions.get(peer_id) {
            let mut state = entry.state.lock().await;
            if state.status == SessionStatus::Searching {
                state.status = SessionStatus::Ready;
                state.search_started = None;
            }
        }

        self.metrics.increment_search_timeouts();
        self.send_to_peer(peer_id, ServerMessage::SearchTimeout { waited_secs });
        tracing::debug!(%peer_id, waited_secs, "Search timed out");
    }
}
