//! Waiting pool, score index, block list, and match history.
//!
//! The engine proposes candidates; it never commits pairs. `find_match`
//! leaves both peers in the pool so the pair registry can re-verify session
//! state under its own locks and call [`MatchingEngine::remove`] for both
//! sides atomically with the commit. A `find_match` on a peer that has since
//! been paired (and removed) is a no-op.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::MatchingConfig;
use crate::protocol::{PeerId, Profile};

use super::scorer::compatibility_score;

/// Pool entry: profile snapshot plus queue bookkeeping.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub peer_id: PeerId,
    pub profile: Profile,
    pub joined_at: Instant,
    pub attempts: u32,
}

/// A proposed partner, with the cached pairwise score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate {
    pub peer_id: PeerId,
    pub score: f64,
}

/// Summary counts for stats and introspection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    pub waiting: usize,
    pub waiting_video: usize,
    pub waiting_text: usize,
    pub avg_wait_secs: f64,
    pub avg_attempts: f64,
    pub blocked_peers: usize,
    pub history_entries: usize,
}

/// Unordered pair of peer ids, stored under one canonical ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(PeerId, PeerId);

impl PairKey {
    fn new(a: PeerId, b: PeerId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

#[derive(Default)]
struct MatchState {
    waiting: HashMap<PeerId, PeerSnapshot>,
    /// Precomputed pairwise scores, kept in both directions.
    scores: HashMap<PeerId, HashMap<PeerId, f64>>,
    blocks: HashMap<PeerId, HashSet<PeerId>>,
    history: HashMap<PairKey, u32>,
}

impl MatchState {
    fn is_blocked(&self, a: PeerId, b: PeerId) -> bool {
        self.blocks.get(&a).is_some_and(|set| set.contains(&b))
            || self.blocks.get(&b).is_some_and(|set| set.contains(&a))
    }

    /// Basic-compatibility filter: mutual gender preference, mutual age
    /// range, distinct peers, no block either way. Chat mode is *not*
    /// checked here — it can change between searches and is enforced
    /// strictly at selection time instead.
    fn mutually_compatible(&self, a: &PeerSnapshot, b: &PeerSnapshot) -> bool {
        a.peer_id != b.peer_id
            && !self.is_blocked(a.peer_id, b.peer_id)
            && a.profile.gender_preference.accepts(b.profile.gender)
            && b.profile.gender_preference.accepts(a.profile.gender)
            && a.profile.age_range.contains(b.profile.age)
            && b.profile.age_range.contains(a.profile.age)
    }

    fn evict_scores(&mut self, peer_id: PeerId) {
        self.scores.remove(&peer_id);
        for index in self.scores.values_mut() {
            index.remove(&peer_id);
        }
    }
}

pub struct MatchingEngine {
    config: MatchingConfig,
    state: Mutex<MatchState>,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MatchState::default()),
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Insert a peer into the waiting pool and precompute scores against
    /// every basic-compatible candidate, in both directions. O(N) in pool
    /// size. Re-adding a peer refreshes its snapshot and scores.
    pub async fn add(&self, snapshot: PeerSnapshot) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let peer_id = snapshot.peer_id;

        state.evict_scores(peer_id);

        let mut own_index = HashMap::new();
        let mut reverse: Vec<(PeerId, f64)> = Vec::new();
        for other in state.waiting.values() {
            if !state.mutually_compatible(&snapshot, other) {
                continue;
            }
            let history = state
                .history
                .get(&PairKey::new(peer_id, other.peer_id))
                .copied()
                .unwrap_or(0);
            let score = compatibility_score(&snapshot, other, now, history, &self.config);
            own_index.insert(other.peer_id, score);
            reverse.push((other.peer_id, score));
        }

        for (other_id, score) in reverse {
            state.scores.entry(other_id).or_default().insert(peer_id, score);
        }
        state.scores.insert(peer_id, own_index);
        state.waiting.insert(peer_id, snapshot);
    }

    /// Remove a peer from the pool and evict every cache entry mentioning
    /// it. Idempotent.
    pub async fn remove(&self, peer_id: PeerId) {
        let mut state = self.state.lock().await;
        state.waiting.remove(&peer_id);
        state.evict_scores(peer_id);
    }

    /// Pick the best candidate for a peer, or none.
    ///
    /// Strict mode equality is the critical correctness rule here: a video
    /// seeker is never offered a text seeker, even when the mixed score
    /// would clear the threshold.
    pub async fn find_match(&self, peer_id: PeerId) -> Option<MatchCandidate> {
        let now = Instant::now();
        let state = self.state.lock().await;
        let seeker = state.waiting.get(&peer_id)?;
        let index = state.scores.get(&peer_id)?;
        let threshold = self.config.threshold(seeker.profile.chat_mode);

        let mut best: Option<(MatchCandidate, f64, &PeerSnapshot)> = None;
        for (&candidate_id, &score) in index {
            let Some(candidate) = state.waiting.get(&candidate_id) else {
                continue;
            };
            if candidate.profile.chat_mode != seeker.profile.chat_mode {
                continue;
            }
            if score < threshold {
                continue;
            }

            let effective = score * self.selection_multiplier(candidate, now);
            let challenger = (
                MatchCandidate {
                    peer_id: candidate_id,
                    score,
                },
                effective,
                candidate,
            );
            best = match best {
                None => Some(challenger),
                Some(current) => {
                    if Self::prefer(&challenger, &current) {
                        Some(challenger)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best.map(|(candidate, _, _)| candidate)
    }

    /// Wait-time and priority multipliers applied at selection time, on top
    /// of the cached pairwise score.
    fn selection_multiplier(&self, candidate: &PeerSnapshot, now: Instant) -> f64 {
        let waited = now.saturating_duration_since(candidate.joined_at).as_secs_f64();
        let ceiling = self.config.priority_time_secs as f64;
        let wait_multiplier = 1.0 + 0.3 * (waited / ceiling).min(1.0);
        candidate.profile.priority * wait_multiplier
    }

    /// Deterministic candidate ordering: effective score, then priority,
    /// then wait (earlier `joined_at` wins), then lexicographic peer id.
    fn prefer(
        challenger: &(MatchCandidate, f64, &PeerSnapshot),
        incumbent: &(MatchCandidate, f64, &PeerSnapshot),
    ) -> bool {
        let (c_cand, c_eff, c_snap) = challenger;
        let (i_cand, i_eff, i_snap) = incumbent;

        if c_eff != i_eff {
            return c_eff > i_eff;
        }
        if c_snap.profile.priority != i_snap.profile.priority {
            return c_snap.profile.priority > i_snap.profile.priority;
        }
        if c_snap.joined_at != i_snap.joined_at {
            return c_snap.joined_at < i_snap.joined_at;
        }
        c_cand.peer_id < i_cand.peer_id
    }

    /// Symmetric block: neither peer will ever be offered the other again.
    pub async fn block(&self, peer_id: PeerId, other_id: PeerId) {
        let mut state = self.state.lock().await;
        state.blocks.entry(peer_id).or_default().insert(other_id);
        state.blocks.entry(other_id).or_default().insert(peer_id);

        if let Some(index) = state.scores.get_mut(&peer_id) {
            index.remove(&other_id);
        }
        if let Some(index) = state.scores.get_mut(&other_id) {
            index.remove(&peer_id);
        }
    }

    /// Record a committed pairing in the match history, raising the repeat
    /// penalty for future scores.
    pub async fn record_match(&self, a: PeerId, b: PeerId) {
        let mut state = self.state.lock().await;
        *state.history.entry(PairKey::new(a, b)).or_insert(0) += 1;
    }

    pub async fn contains(&self, peer_id: PeerId) -> bool {
        self.state.lock().await.waiting.contains_key(&peer_id)
    }

    /// Snapshot of searching peers for the rematch sweeper.
    pub async fn searching_peers(&self) -> Vec<(PeerId, Instant, u32)> {
        self.state
            .lock()
            .await
            .waiting
            .values()
            .map(|entry| (entry.peer_id, entry.joined_at, entry.attempts))
            .collect()
    }

    pub async fn pool_size(&self) -> usize {
        self.state.lock().await.waiting.len()
    }

    pub async fn stats(&self) -> EngineStats {
        let now = Instant::now();
        let state = self.state.lock().await;
        let waiting = state.waiting.len();

        let mut waiting_video = 0;
        let mut total_wait = 0.0;
        let mut total_attempts = 0u64;
        for entry in state.waiting.values() {
            if entry.profile.chat_mode == crate::protocol::ChatMode::Video {
                waiting_video += 1;
            }
            total_wait += now.saturating_duration_since(entry.joined_at).as_secs_f64();
            total_attempts += u64::from(entry.attempts);
        }

        let divisor = waiting.max(1) as f64;
        EngineStats {
            waiting,
            waiting_video,
            waiting_text: waiting - waiting_video,
            avg_wait_secs: total_wait / divisor,
            avg_attempts: total_attempts as f64 / divisor,
            blocked_peers: state.blocks.len(),
            history_entries: state.history.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AgeRange, ChatMode, Gender, GenderPreference};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn engine() -> MatchingEngine {
        MatchingEngine::new(MatchingConfig::default())
    }

    fn snapshot(age: u8, interests: &[&str], mode: ChatMode) -> PeerSnapshot {
        PeerSnapshot {
            peer_id: Uuid::new_v4(),
            profile: Profile {
                username: format!("peer-{age}"),
                gender: Gender::NotSpecified,
                age,
                interests: interests.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
                chat_mode: mode,
                gender_preference: GenderPreference::Any,
                age_range: AgeRange::default(),
                priority: 1.0,
            },
            joined_at: Instant::now(),
            attempts: 0,
        }
    }

    #[tokio::test]
    async fn compatible_text_peers_match() {
        let engine = engine();
        let a = snapshot(25, &["music", "travel"], ChatMode::Text);
        let b = snapshot(27, &["music"], ChatMode::Text);
        let a_id = a.peer_id;
        let b_id = b.peer_id;

        engine.add(a).await;
        engine.add(b).await;

        let candidate = engine.find_match(a_id).await.expect("match found");
        assert_eq!(candidate.peer_id, b_id);
        assert!(candidate.score >= 65.0);

        // Symmetric lookup proposes the same pairing
        let reverse = engine.find_match(b_id).await.expect("match found");
        assert_eq!(reverse.peer_id, a_id);
    }

    #[tokio::test]
    async fn mode_mismatch_never_matches() {
        let engine = engine();
        let text = snapshot(25, &["music", "travel"], ChatMode::Text);
        let video = snapshot(25, &["music", "travel"], ChatMode::Video);
        let text_id = text.peer_id;
        let video_id = video.peer_id;

        engine.add(text).await;
        engine.add(video).await;

        assert!(engine.find_match(text_id).await.is_none());
        assert!(engine.find_match(video_id).await.is_none());

        // A compatible third peer in video mode matches the video seeker
        let video2 = snapshot(26, &["music"], ChatMode::Video);
        let video2_id = video2.peer_id;
        engine.add(video2).await;

        let candidate = engine.find_match(video_id).await.expect("video match");
        assert_eq!(candidate.peer_id, video2_id);
        assert!(engine.find_match(text_id).await.is_none());
    }

    #[tokio::test]
    async fn age_out_of_range_is_filtered_at_add() {
        let engine = engine();
        let mut a = snapshot(22, &["music"], ChatMode::Text);
        a.profile.age_range = AgeRange { min: 30, max: 60 };
        let b = snapshot(25, &["music"], ChatMode::Text);
        let a_id = a.peer_id;
        let b_id = b.peer_id;

        engine.add(a).await;
        engine.add(b).await;

        assert!(engine.find_match(a_id).await.is_none());
        assert!(engine.find_match(b_id).await.is_none());
    }

    #[tokio::test]
    async fn gender_preference_is_mutual() {
        let engine = engine();
        let mut a = snapshot(25, &["music"], ChatMode::Text);
        a.profile.gender = Gender::Male;
        a.profile.gender_preference = GenderPreference::Female;
        let mut b = snapshot(26, &["music"], ChatMode::Text);
        b.profile.gender = Gender::Female;
        b.profile.gender_preference = GenderPreference::Female;
        let a_id = a.peer_id;

        engine.add(a).await;
        engine.add(b).await;

        // a accepts b, but b does not accept a
        assert!(engine.find_match(a_id).await.is_none());
    }

    #[tokio::test]
    async fn blocked_peers_never_match() {
        let engine = engine();
        let a = snapshot(25, &["music", "travel"], ChatMode::Text);
        let b = snapshot(25, &["music", "travel"], ChatMode::Text);
        let a_id = a.peer_id;
        let b_id = b.peer_id;

        engine.block(a_id, b_id).await;
        engine.add(a).await;
        engine.add(b).await;

        assert!(engine.find_match(a_id).await.is_none());
        assert!(engine.find_match(b_id).await.is_none());
    }

    #[tokio::test]
    async fn block_evicts_existing_scores() {
        let engine = engine();
        let a = snapshot(25, &["music", "travel"], ChatMode::Text);
        let b = snapshot(27, &["music"], ChatMode::Text);
        let a_id = a.peer_id;
        let b_id = b.peer_id;

        engine.add(a).await;
        engine.add(b).await;
        assert!(engine.find_match(a_id).await.is_some());

        engine.block(a_id, b_id).await;
        assert!(engine.find_match(a_id).await.is_none());
        assert!(engine.find_match(b_id).await.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_evicts_both_directions() {
        let engine = engine();
        let a = snapshot(25, &["music", "travel"], ChatMode::Text);
        let b = snapshot(27, &["music"], ChatMode::Text);
        let a_id = a.peer_id;
        let b_id = b.peer_id;

        engine.add(a).await;
        engine.add(b).await;
        engine.remove(a_id).await;
        engine.remove(a_id).await;

        assert!(!engine.contains(a_id).await);
        assert!(engine.find_match(b_id).await.is_none());
    }

    #[tokio::test]
    async fn find_match_on_absent_peer_is_noop() {
        let engine = engine();
        assert!(engine.find_match(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn higher_scoring_candidate_wins() {
        let engine = engine();
        let seeker = snapshot(25, &["music", "travel", "games"], ChatMode::Text);
        let strong = snapshot(25, &["music", "travel", "games"], ChatMode::Text);
        let weak = snapshot(45, &["music"], ChatMode::Text);
        let seeker_id = seeker.peer_id;
        let strong_id = strong.peer_id;

        engine.add(seeker).await;
        engine.add(weak).await;
        engine.add(strong).await;

        let candidate = engine.find_match(seeker_id).await.expect("match found");
        assert_eq!(candidate.peer_id, strong_id);
    }

    #[tokio::test]
    async fn premium_candidate_wins_over_equal_score() {
        let engine = engine();
        let joined = Instant::now();
        let seeker = snapshot(25, &["music"], ChatMode::Text);
        let mut regular = snapshot(26, &["music"], ChatMode::Text);
        let mut premium = snapshot(26, &["music"], ChatMode::Text);
        regular.joined_at = joined;
        premium.joined_at = joined;
        premium.profile.priority = 2.0;
        let seeker_id = seeker.peer_id;
        let premium_id = premium.peer_id;

        engine.add(seeker).await;
        engine.add(regular).await;
        engine.add(premium).await;

        let candidate = engine.find_match(seeker_id).await.expect("match found");
        assert_eq!(candidate.peer_id, premium_id);
    }

    #[tokio::test]
    async fn stats_report_pool_composition() {
        let engine = engine();
        engine.add(snapshot(25, &["music"], ChatMode::Text)).await;
        engine.add(snapshot(26, &["music"], ChatMode::Video)).await;

        let stats = engine.stats().await;
        assert_eq!(stats.waiting, 2);
        assert_eq!(stats.waiting_video, 1);
        assert_eq!(stats.waiting_text, 1);
    }

    #[tokio::test]
    async fn history_lowers_future_scores() {
        let engine = engine();
        let a = snapshot(25, &["music", "travel"], ChatMode::Text);
        let b = snapshot(27, &["music"], ChatMode::Text);
        let a_id = a.peer_id;
        let b_id = b.peer_id;

        engine.add(a.clone()).await;
        engine.add(b.clone()).await;
        let first = engine.find_match(a_id).await.expect("match").score;

        engine.record_match(a_id, b_id).await;
        engine.record_match(a_id, b_id).await;

        // Re-add to recompute scores with the updated history
        engine.remove(a_id).await;
        engine.remove(b_id).await;
        engine.add(a).await;
        engine.add(b).await;

        match engine.find_match(a_id).await {
            Some(candidate) => assert!(candidate.score < first),
            // Penalty may push the pair below the threshold entirely
            None => {}
        }
    }
}
