//! Configuration module for Pairlink.
//!
//! This module provides configuration management with support for:
//! - A `config.json` file (working directory or `PAIRLINK_CONFIG_PATH`)
//! - `PAIRLINK__`-prefixed environment variable overrides
//! - `.env` files for local development
//! - Sensible defaults compiled into the binary
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Session lifecycle and timer settings
//! - [`matching`]: Scoring weights and matching thresholds
//! - [`security`]: CORS, size limits, ICE server passthrough
//! - [`websocket`]: WebSocket connection settings
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod matching;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;
pub mod websocket;

// Re-exports for convenience
pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use matching::MatchingConfig;

pub use security::{IceServerConfig, SecurityConfig};

pub use server::ServerConfig;

pub use types::Config;

pub use validation::{is_production_mode, validate_config};

pub use websocket::WebSocketConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3720);
        assert_eq!(config.server.inactive_threshold_secs, 300);
        assert_eq!(config.server.cleanup_interval_secs, 60);
        assert_eq!(config.server.max_wait_time_secs, 45);
        assert_eq!(config.server.rematch_interval_secs, 5);
        assert_eq!(config.server.typing_ttl_secs, 3);
        assert_eq!(config.server.call_request_ttl_secs, 30);

        assert_eq!(config.matching.interest_weight, 0.35);
        assert_eq!(config.matching.demographic_weight, 0.25);
        assert_eq!(config.matching.chat_mode_weight, 0.30);
        assert_eq!(config.matching.behavior_weight, 0.10);
        assert_eq!(config.matching.video_threshold, 70.0);
        assert_eq!(config.matching.text_threshold, 65.0);
        assert_eq!(config.matching.optimal_age_diff, 5);
        assert_eq!(config.matching.max_age_diff, 25);

        assert_eq!(config.security.max_message_size, 65536);
        assert_eq!(config.security.max_connections_per_ip, 10);

        assert!(config.logging.level.is_none());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(
            config.server.max_wait_time_secs,
            deserialized.server.max_wait_time_secs
        );
        assert_eq!(
            config.matching.text_threshold,
            deserialized.matching.text_threshold
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"matching":{"text_threshold":55.0}}"#).unwrap();
        assert_eq!(config.matching.text_threshold, 55.0);
        assert_eq!(config.matching.video_threshold, 70.0);
        assert_eq!(config.port, 3720);
    }
}
