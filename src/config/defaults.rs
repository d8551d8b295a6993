//! Default value functions referenced by the serde `default` attributes.

pub fn default_port() -> u16 {
    3720
}

// server

pub fn default_inactive_threshold_secs() -> u64 {
    300
}

pub fn default_cleanup_interval_secs() -> u64 {
    60
}

pub fn default_max_wait_time_secs() -> u64 {
    45
}

pub fn default_rematch_interval_secs() -> u64 {
    5
}

pub fn default_stats_broadcast_interval_secs() -> u64 {
    10
}

pub fn default_typing_ttl_secs() -> u64 {
    3
}

pub fn default_call_request_ttl_secs() -> u64 {
    30
}

pub fn default_recent_message_cap() -> usize {
    50
}

// matching

pub fn default_interest_weight() -> f64 {
    0.35
}

pub fn default_demographic_weight() -> f64 {
    0.25
}

pub fn default_chat_mode_weight() -> f64 {
    0.30
}

pub fn default_behavior_weight() -> f64 {
    0.10
}

pub fn default_optimal_age_diff() -> u8 {
    5
}

pub fn default_max_age_diff() -> u8 {
    25
}

pub fn default_same_gender_bonus() -> f64 {
    0.10
}

pub fn default_premium_bonus() -> f64 {
    0.10
}

pub fn default_video_mode_bonus() -> f64 {
    0.10
}

pub fn default_video_text_penalty() -> f64 {
    0.15
}

pub fn default_age_range_bonus() -> f64 {
    0.10
}

pub fn default_priority_time_secs() -> u64 {
    15
}

pub fn default_wait_boost_floor_secs() -> u64 {
    5
}

pub fn default_video_threshold() -> f64 {
    70.0
}

pub fn default_text_threshold() -> f64 {
    65.0
}

// security

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub fn default_max_message_size() -> usize {
    65536
}

pub fn default_max_connections_per_ip() -> usize {
    10
}

// websocket

pub fn default_outbound_queue_capacity() -> usize {
    64
}
