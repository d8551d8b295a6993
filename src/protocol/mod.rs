//! WebSocket message protocol: event tags, payload schemas, and the domain
//! types they carry.
//!
//! Inbound events form a closed set; unknown tags and malformed payloads are
//! rejected with `InvalidMessage` instead of being interpreted loosely.

pub mod error_codes;
pub mod messages;
pub mod room_ids;
pub mod types;
pub mod validation;

pub use error_codes::ErrorCode;
pub use messages::{
    ChatMessagePayload, ClientMessage, MatchedPayload, PartnerInfoPayload, RegisterPayload,
    ServerMessage, StatsPayload,
};
pub use types::{
    AgeRange, CallId, CallStatus, ChatMode, Gender, GenderPreference, PeerId, Profile, RoomId,
    TeardownReason,
};
