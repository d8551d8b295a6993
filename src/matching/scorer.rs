//! Pure compatibility scoring between two waiting peers.
//!
//! Deterministic given its inputs: two pool snapshots, the current instant,
//! and how often the two peers have been paired before. Produces a score in
//! [0, 100], rounded to one decimal.

use std::time::Instant;

use crate::config::MatchingConfig;
use crate::protocol::ChatMode;

use super::engine::PeerSnapshot;

const BASE_SCORE: f64 = 50.0;
/// Flat bonus on the interest term for any overlap at all.
const SHARED_INTEREST_BONUS: f64 = 0.3;
/// Wait boost saturates at this fraction of the behavior term.
const MAX_WAIT_BOOST: f64 = 0.3;
/// Attempts boost saturates at this fraction of the behavior term.
const MAX_ATTEMPTS_BOOST: f64 = 0.2;
/// Attempts at which the attempts boost saturates.
const ATTEMPTS_SATURATION: f64 = 5.0;
/// Hard cap on the repeat-pairing penalty inside the adjustment.
const MAX_HISTORY_PENALTY: f64 = 0.3;
const HISTORY_PENALTY_STEP: f64 = 0.1;
const ADJUSTMENT_BOUND: f64 = 0.3;

/// Score a potential pairing. Symmetric up to the per-direction preference
/// terms, which sum to the same total regardless of argument order.
pub fn compatibility_score(
    a: &PeerSnapshot,
    b: &PeerSnapshot,
    now: Instant,
    history_count: u32,
    cfg: &MatchingConfig,
) -> f64 {
    let weighted = interest_term(a, b, cfg)
        + demographic_term(a, b, cfg)
        + chat_mode_term(a, b, cfg)
        + behavior_term(a, b, now, cfg);

    let adjustment = adjustment_factor(a, b, history_count, cfg);

    let score = (BASE_SCORE + weighted) * (1.0 + adjustment);
    round1(score).clamp(0.0, 100.0)
}

/// Jaccard similarity over normalized interest sets, plus a flat bonus for
/// any non-empty intersection, capped at 1.0.
fn interest_term(a: &PeerSnapshot, b: &PeerSnapshot, cfg: &MatchingConfig) -> f64 {
    let intersection = a.profile.interests.intersection(&b.profile.interests).count();
    let union = a.profile.interests.union(&b.profile.interests).count();

    let mut raw = if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    };
    if intersection > 0 {
        raw += SHARED_INTEREST_BONUS;
    }

    raw.min(1.0) * cfg.interest_weight * BASE_SCORE
}

fn demographic_term(a: &PeerSnapshot, b: &PeerSnapshot, cfg: &MatchingConfig) -> f64 {
    let mut raw = 0.5;

    raw += age_proximity_bonus(
        a.profile.age,
        b.profile.age,
        cfg.optimal_age_diff,
        cfg.max_age_diff,
    );

    if a.profile.gender_preference.accepts(b.profile.gender) {
        raw += 0.15;
    }
    if b.profile.gender_preference.accepts(a.profile.gender) {
        raw += 0.15;
    }

    if a.profile.gender.is_specified() && a.profile.gender == b.profile.gender {
        raw += cfg.same_gender_bonus;
    }

    raw * cfg.demographic_weight * BASE_SCORE
}

/// +0.3 within the optimal band, decaying linearly to zero at `max_diff`.
fn age_proximity_bonus(age_a: u8, age_b: u8, optimal_diff: u8, max_diff: u8) -> f64 {
    let diff = f64::from(age_a.abs_diff(age_b));
    let optimal = f64::from(optimal_diff);
    let max = f64::from(max_diff);

    if diff <= optimal {
        0.3
    } else if diff < max {
        0.3 * (1.0 - (diff - optimal) / (max - optimal))
    } else {
        0.0
    }
}

fn chat_mode_term(a: &PeerSnapshot, b: &PeerSnapshot, cfg: &MatchingConfig) -> f64 {
    let raw = match (a.profile.chat_mode, b.profile.chat_mode) {
        (ChatMode::Video, ChatMode::Video) => 1.0,
        (ChatMode::Text, ChatMode::Text) => 0.8,
        _ => 0.4,
    };
    raw * cfg.chat_mode_weight * BASE_SCORE
}

/// Wait-time and attempts boosts so long-waiting peers score higher against
/// everyone, raising their chance of clearing the threshold.
fn behavior_term(a: &PeerSnapshot, b: &PeerSnapshot, now: Instant, cfg: &MatchingConfig) -> f64 {
    let wait_a = now.saturating_duration_since(a.joined_at).as_secs_f64();
    let wait_b = now.saturating_duration_since(b.joined_at).as_secs_f64();
    let avg_wait = (wait_a + wait_b) / 2.0;

    let floor = cfg.wait_boost_floor_secs as f64;
    let ceiling = cfg.priority_time_secs as f64;
    let wait_boost = if avg_wait <= floor {
        0.0
    } else {
        MAX_WAIT_BOOST * ((avg_wait - floor) / (ceiling - floor)).min(1.0)
    };

    let avg_attempts = (f64::from(a.attempts) + f64::from(b.attempts)) / 2.0;
    let attempts_boost = MAX_ATTEMPTS_BOOST * (avg_attempts / ATTEMPTS_SATURATION).min(1.0);

    (wait_boost + attempts_boost) * cfg.behavior_weight * BASE_SCORE
}

fn adjustment_factor(
    a: &PeerSnapshot,
    b: &PeerSnapshot,
    history_count: u32,
    cfg: &MatchingConfig,
) -> f64 {
    let mut adjustment = 0.0;

    if a.profile.is_premium() || b.profile.is_premium() {
        adjustment += cfg.premium_bonus;
    }

    match (a.profile.chat_mode, b.profile.chat_mode) {
        (ChatMode::Video, ChatMode::Video) => adjustment += cfg.video_mode_bonus,
        (ChatMode::Text, ChatMode::Text) => {}
        _ => adjustment -= cfg.video_text_penalty,
    }

    if a.profile.age_range.contains(b.profile.age) {
        adjustment += cfg.age_range_bonus / 2.0;
    }
    if b.profile.age_range.contains(a.profile.age) {
        adjustment += cfg.age_range_bonus / 2.0;
    }

    adjustment -=
        (HISTORY_PENALTY_STEP * f64::from(history_count)).min(MAX_HISTORY_PENALTY);

    adjustment.clamp(-ADJUSTMENT_BOUND, ADJUSTMENT_BOUND)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
