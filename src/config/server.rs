//! Server behavior configuration types.

use super::defaults::{
    default_call_request_ttl_secs, default_cleanup_interval_secs, default_inactive_threshold_secs,
    default_max_wait_time_secs, default_recent_message_cap, default_rematch_interval_secs,
    default_stats_broadcast_interval_secs, default_typing_ttl_secs,
};
use serde::{Deserialize, Serialize};

/// Session lifecycle and timer configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Time without any inbound event before a session is force-disconnected (seconds)
    #[serde(default = "default_inactive_threshold_secs")]
    pub inactive_threshold_secs: u64,
    /// Interval for the inactivity/expiry sweep (seconds)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Maximum time a peer stays in the waiting pool before `search-timeout` (seconds)
    #[serde(default = "default_max_wait_time_secs")]
    pub max_wait_time_secs: u64,
    /// Interval between rematch attempts for searching peers (seconds)
    #[serde(default = "default_rematch_interval_secs")]
    pub rematch_interval_secs: u64,
    /// Interval for the `stats-updated` broadcast (seconds)
    #[serde(default = "default_stats_broadcast_interval_secs")]
    pub stats_broadcast_interval_secs: u64,
    /// Typing indicator expiry after the last keystroke event (seconds)
    #[serde(default = "default_typing_ttl_secs")]
    pub typing_ttl_secs: u64,
    /// Expiry for out-of-band video-call requests (seconds)
    #[serde(default = "default_call_request_ttl_secs")]
    pub call_request_ttl_secs: u64,
    /// How many recent chat messages to retain per peer (best effort,
    /// cleared at pair teardown)
    #[serde(default = "default_recent_message_cap")]
    pub recent_message_cap: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            inactive_threshold_secs: default_inactive_threshold_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            max_wait_time_secs: default_max_wait_time_secs(),
            rematch_interval_secs: default_rematch_interval_secs(),
            stats_broadcast_interval_secs: default_stats_broadcast_interval_secs(),
            typing_ttl_secs: default_typing_ttl_secs(),
            call_request_ttl_secs: default_call_request_ttl_secs(),
            recent_message_cap: default_recent_message_cap(),
        }
    }
}
