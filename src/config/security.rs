//! Security and transport-facing configuration.

use super::defaults::{
    default_cors_origins, default_max_connections_per_ip, default_max_message_size,
};
use serde::{Deserialize, Serialize};

/// Transport and abuse-control settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Comma-separated allowed origins, or `*` for permissive CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Maximum inbound WebSocket frame size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum simultaneous connections per client IP
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
    /// ICE servers handed to clients on `/ice-config`. Opaque to the server;
    /// typically one STUN entry plus TURN credentials.
    #[serde(default)]
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            max_message_size: default_max_message_size(),
            max_connections_per_ip: default_max_connections_per_ip(),
            ice_servers: Vec::new(),
        }
    }
}

/// A single ICE server entry, passed through to clients verbatim.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}
