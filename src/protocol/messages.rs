use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{AgeRange, CallId, ChatMode, Gender, GenderPreference, PeerId, RoomId, TeardownReason};

/// Raw registration payload as sent by the client. Loosely typed on purpose;
/// [`crate::protocol::validation::normalize_profile`] turns it into a
/// [`super::Profile`] or rejects it with `InvalidProfile`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub username: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    pub age: u8,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub chat_mode: Option<ChatMode>,
    #[serde(default)]
    pub gender_preference: Option<GenderPreference>,
    #[serde(default)]
    pub age_range: Option<AgeRange>,
    #[serde(default)]
    pub priority: Option<f64>,
    /// When set on both sides of a video pair, the server emits
    /// `video-call-auto-start` right after `video-match-ready`.
    #[serde(default)]
    pub auto_connect: bool,
}

/// Message types sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Create a session with a profile (must precede everything else)
    #[serde(rename = "register")]
    Register(RegisterPayload),
    /// Enter the waiting pool, optionally overriding the chat mode
    #[serde(rename = "search")]
    Search {
        #[serde(default)]
        mode: Option<ChatMode>,
    },
    /// Leave the waiting pool
    #[serde(rename = "cancel-search")]
    CancelSearch,
    /// Chat message for the current partner
    #[serde(rename = "message")]
    Message { text: String },
    /// Typing indicator with a server-side expiry timer
    #[serde(rename = "typing")]
    Typing,
    #[serde(rename = "typingStopped")]
    TypingStopped,
    /// Leave the current pair and immediately search again
    #[serde(rename = "next")]
    Next,
    /// Leave the current pair and stay idle
    #[serde(rename = "disconnect-partner")]
    DisconnectPartner {
        #[serde(default)]
        reason: Option<String>,
    },
    /// WebRTC offer; SDP is opaque to the server
    #[serde(rename = "webrtc-offer", rename_all = "camelCase")]
    WebrtcOffer {
        to: PeerId,
        sdp: String,
        #[serde(default)]
        call_id: Option<CallId>,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    /// WebRTC answer; SDP is opaque to the server
    #[serde(rename = "webrtc-answer", rename_all = "camelCase")]
    WebrtcAnswer {
        to: PeerId,
        sdp: String,
        call_id: CallId,
        #[serde(default)]
        room_id: Option<RoomId>,
    },
    /// ICE candidate, forwarded without inspection
    #[serde(rename = "webrtc-ice-candidate")]
    WebrtcIceCandidate {
        to: PeerId,
        candidate: serde_json::Value,
    },
    /// End the current call (the pair itself stays alive)
    #[serde(rename = "webrtc-end")]
    WebrtcEnd {
        to: PeerId,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Reject an incoming call (the pair itself stays alive)
    #[serde(rename = "webrtc-reject")]
    WebrtcReject { to: PeerId, reason: String },
    /// Opaque call-status relay to the partner
    #[serde(rename = "video-call-status")]
    VideoCallStatus(serde_json::Value),
    /// Opaque media-toggle relay to the partner
    #[serde(rename = "call-toggle-media")]
    CallToggleMedia(serde_json::Value),
    /// Opaque screen-share relay to the partner
    #[serde(rename = "screen-share-status")]
    ScreenShareStatus(serde_json::Value),
    /// Out-of-band video-call request (30 s TTL, distinct from the offer)
    #[serde(rename = "video-call-request", rename_all = "camelCase")]
    VideoCallRequest {
        #[serde(default)]
        call_id: Option<CallId>,
    },
    #[serde(rename = "get-partner-info")]
    GetPartnerInfo,
    #[serde(rename = "get-stats")]
    GetStats,
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

/// Public subset of a partner's profile shared on match and on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInfoPayload {
    pub peer_id: PeerId,
    pub username: String,
    pub gender: Gender,
    pub age: u8,
    pub interests: Vec<String>,
}

/// Payload for the Matched server message.
/// Boxed in ServerMessage to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPayload {
    pub room_id: RoomId,
    pub partner: PartnerInfoPayload,
    /// Compatibility score in [0, 100] at pairing time.
    pub compatibility: f64,
    pub shared_interests: Vec<String>,
    pub match_mode: ChatMode,
    pub timestamp: DateTime<Utc>,
}

/// A relayed chat message with server-assigned identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub id: uuid::Uuid,
    pub from: PeerId,
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Live server counts, broadcast periodically and returned on `get-stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    pub online_peers: usize,
    pub searching_peers: usize,
    pub active_pairs: usize,
    pub active_calls: usize,
    pub waiting_call_requests: usize,
    pub typing_peers: usize,
    pub avg_wait_secs: f64,
    pub avg_search_attempts: f64,
    pub timestamp: DateTime<Utc>,
}

/// Message types sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Registration accepted; echoes the normalized profile
    #[serde(rename = "registered", rename_all = "camelCase")]
    Registered {
        peer_id: PeerId,
        profile: super::Profile,
    },
    /// Search started
    #[serde(rename = "searching")]
    Searching {
        mode: ChatMode,
        timestamp: DateTime<Utc>,
    },
    /// Periodic progress while in the waiting pool
    #[serde(rename = "searching-update", rename_all = "camelCase")]
    SearchingUpdate {
        waited_secs: u64,
        pool_size: usize,
        attempts: u32,
    },
    /// Search gave up after the configured maximum wait
    #[serde(rename = "search-timeout", rename_all = "camelCase")]
    SearchTimeout { waited_secs: u64 },
    #[serde(rename = "search-cancelled")]
    SearchCancelled,
    /// Paired with a partner (boxed to reduce enum size)
    #[serde(rename = "matched")]
    Matched(Box<MatchedPayload>),
    /// A video pair is ready for WebRTC negotiation
    #[serde(rename = "video-match-ready", rename_all = "camelCase")]
    VideoMatchReady { room_id: RoomId, call_id: CallId },
    /// Both sides opted into auto-connect; the caller may start immediately
    #[serde(rename = "video-call-auto-start", rename_all = "camelCase")]
    VideoCallAutoStart { room_id: RoomId, call_id: CallId },
    #[serde(rename = "partnerTyping")]
    PartnerTyping,
    #[serde(rename = "partnerTypingStopped")]
    PartnerTypingStopped,
    /// Chat message from the partner
    #[serde(rename = "message")]
    Message(ChatMessagePayload),
    /// Delivery acknowledgement to the sender
    #[serde(rename = "message-sent", rename_all = "camelCase")]
    MessageSent {
        id: uuid::Uuid,
        timestamp: DateTime<Utc>,
    },
    /// The pair was torn down
    #[serde(rename = "partnerDisconnected")]
    PartnerDisconnected { reason: TeardownReason },
    #[serde(rename = "webrtc-offer", rename_all = "camelCase")]
    WebrtcOffer {
        from: PeerId,
        sdp: String,
        call_id: CallId,
        room_id: RoomId,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    #[serde(rename = "webrtc-answer", rename_all = "camelCase")]
    WebrtcAnswer {
        from: PeerId,
        sdp: String,
        call_id: CallId,
        room_id: RoomId,
    },
    #[serde(rename = "webrtc-ice-candidate")]
    WebrtcIceCandidate {
        from: PeerId,
        candidate: serde_json::Value,
    },
    #[serde(rename = "webrtc-end")]
    WebrtcEnd {
        from: PeerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "webrtc-reject")]
    WebrtcReject { from: PeerId, reason: String },
    #[serde(rename = "video-call-status")]
    VideoCallStatus {
        from: PeerId,
        payload: serde_json::Value,
    },
    #[serde(rename = "call-toggle-media")]
    CallToggleMedia {
        from: PeerId,
        payload: serde_json::Value,
    },
    #[serde(rename = "screen-share-status")]
    ScreenShareStatus {
        from: PeerId,
        payload: serde_json::Value,
    },
    #[serde(rename = "video-call-request", rename_all = "camelCase")]
    VideoCallRequest { from: PeerId, call_id: CallId },
    /// Current partner profile, or `null` when unpaired
    #[serde(rename = "partner-info", rename_all = "camelCase")]
    PartnerInfo {
        partner: Option<PartnerInfoPayload>,
        room_id: Option<RoomId>,
    },
    #[serde(rename = "stats")]
    Stats(StatsPayload),
    #[serde(rename = "stats-updated")]
    StatsUpdated(StatsPayload),
    #[serde(rename = "heartbeat-response")]
    HeartbeatResponse { timestamp: DateTime<Utc> },
    /// Registration rejected; session state is unchanged
    #[serde(rename = "register-error", rename_all = "camelCase")]
    RegisterError {
        message: String,
        error_code: ErrorCode,
    },
    #[serde(rename = "search-error", rename_all = "camelCase")]
    SearchError {
        message: String,
        error_code: ErrorCode,
    },
    #[serde(rename = "message-error", rename_all = "camelCase")]
    MessageError {
        message: String,
        error_code: ErrorCode,
    },
    #[serde(rename = "webrtc-error", rename_all = "camelCase")]
    WebrtcError {
        message: String,
        error_code: ErrorCode,
    },
    /// Transport-level error (unknown tag, oversized frame, connection caps)
    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
}
