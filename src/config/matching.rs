//! Compatibility scoring weights and matching thresholds.
//!
//! All values have serde defaults so a partial config file can override a
//! single weight without spelling out the rest.

use super::defaults::{
    default_age_range_bonus, default_behavior_weight, default_chat_mode_weight,
    default_demographic_weight, default_interest_weight, default_max_age_diff,
    default_optimal_age_diff, default_premium_bonus, default_priority_time_secs,
    default_same_gender_bonus, default_text_threshold, default_video_mode_bonus,
    default_video_text_penalty, default_video_threshold, default_wait_boost_floor_secs,
};
use serde::{Deserialize, Serialize};

/// Scorer weights, bonuses, and selection thresholds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchingConfig {
    /// Weight of the interest-overlap term
    #[serde(default = "default_interest_weight")]
    pub interest_weight: f64,
    /// Weight of the demographic term
    #[serde(default = "default_demographic_weight")]
    pub demographic_weight: f64,
    /// Weight of the chat-mode term
    #[serde(default = "default_chat_mode_weight")]
    pub chat_mode_weight: f64,
    /// Weight of the wait/attempts behavior term
    #[serde(default = "default_behavior_weight")]
    pub behavior_weight: f64,
    /// Age difference (years) that still earns the full demographic bonus
    #[serde(default = "default_optimal_age_diff")]
    pub optimal_age_diff: u8,
    /// Age difference (years) at which the age bonus decays to zero
    #[serde(default = "default_max_age_diff")]
    pub max_age_diff: u8,
    /// Bonus when both peers declared the same gender
    #[serde(default = "default_same_gender_bonus")]
    pub same_gender_bonus: f64,
    /// Adjustment when either peer is premium
    #[serde(default = "default_premium_bonus")]
    pub premium_bonus: f64,
    /// Adjustment when both peers seek video
    #[serde(default = "default_video_mode_bonus")]
    pub video_mode_bonus: f64,
    /// Penalty when the peers' chat modes differ
    #[serde(default = "default_video_text_penalty")]
    pub video_text_penalty: f64,
    /// Adjustment (halved per direction) when the partner's age falls inside
    /// the other's declared range
    #[serde(default = "default_age_range_bonus")]
    pub age_range_bonus: f64,
    /// Wait time at which the wait boost saturates (seconds)
    #[serde(default = "default_priority_time_secs")]
    pub priority_time_secs: u64,
    /// Wait time below which no wait boost applies (seconds)
    #[serde(default = "default_wait_boost_floor_secs")]
    pub wait_boost_floor_secs: u64,
    /// Minimum score to pair two video seekers
    #[serde(default = "default_video_threshold")]
    pub video_threshold: f64,
    /// Minimum score to pair two text seekers
    #[serde(default = "default_text_threshold")]
    pub text_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            interest_weight: default_interest_weight(),
            demographic_weight: default_demographic_weight(),
            chat_mode_weight: default_chat_mode_weight(),
            behavior_weight: default_behavior_weight(),
            optimal_age_diff: default_optimal_age_diff(),
            max_age_diff: default_max_age_diff(),
            same_gender_bonus: default_same_gender_bonus(),
            premium_bonus: default_premium_bonus(),
            video_mode_bonus: default_video_mode_bonus(),
            video_text_penalty: default_video_text_penalty(),
            age_range_bonus: default_age_range_bonus(),
            priority_time_secs: default_priority_time_secs(),
            wait_boost_floor_secs: default_wait_boost_floor_secs(),
            video_threshold: default_video_threshold(),
            text_threshold: default_text_threshold(),
        }
    }
}

impl MatchingConfig {
    /// Score threshold for a pair of the given mode.
    pub fn threshold(&self, mode: crate::protocol::ChatMode) -> f64 {
        match mode {
            crate::protocol::ChatMode::Video => self.video_threshold,
            crate::protocol::ChatMode::Text => self.text_threshold,
        }
    }
}
