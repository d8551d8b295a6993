#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Pairlink Server
//!
//! A lightweight, in-memory WebSocket pairing and signaling server for
//! anonymous 1:1 chat.
//!
//! Clients register a profile, enter the matching queue, get paired with a
//! compatible stranger, and exchange text messages, typing indicators, and
//! opaque WebRTC signaling until either side moves on.
//!
//! No database, no cloud services. Just run the binary and connect via
//! WebSocket.

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Compatibility scoring and the waiting-pool matching engine
pub mod matching;

/// Metrics collection and reporting
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Main server orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
