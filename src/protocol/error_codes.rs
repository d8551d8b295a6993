use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Registration errors
    InvalidProfile,
    AlreadyRegistered,
    NotRegistered,

    // Message/payload errors
    InvalidMessage,
    MessageTooLarge,
    EmptyMessage,

    // Pairing errors
    NotPaired,
    AlreadySearching,
    NotSearching,

    // Connection errors
    TooManyConnections,

    // Server errors
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code, suitable for
    /// showing to end users or for client-side debugging.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidProfile => {
                "The registration profile is invalid. Check the username, age range, and interest fields."
            }
            Self::AlreadyRegistered => {
                "This connection has already registered a profile. Reconnect to register again."
            }
            Self::NotRegistered => {
                "No profile has been registered on this connection. Send a register event first."
            }
            Self::InvalidMessage => {
                "The message is malformed or uses an unknown event type. Check the payload schema."
            }
            Self::MessageTooLarge => {
                "The message size exceeds the maximum allowed limit. Please send a smaller message."
            }
            Self::EmptyMessage => {
                "Chat messages must contain at least one non-whitespace character."
            }
            Self::NotPaired => {
                "You are not currently paired with that peer. This event only works inside an active pair."
            }
            Self::AlreadySearching => {
                "A partner search is already in progress for this connection."
            }
            Self::NotSearching => {
                "No partner search is in progress, so there is nothing to cancel."
            }
            Self::TooManyConnections => {
                "You have too many active connections. Close some connections before opening new ones."
            }
            Self::InternalError => {
                "An internal server error occurred. Please try again or reconnect."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_error_codes_have_descriptions() {
        let error_codes = [
            ErrorCode::InvalidProfile,
            ErrorCode::AlreadyRegistered,
            ErrorCode::NotRegistered,
            ErrorCode::InvalidMessage,
            ErrorCode::MessageTooLarge,
            ErrorCode::EmptyMessage,
            ErrorCode::NotPaired,
            ErrorCode::AlreadySearching,
            ErrorCode::NotSearching,
            ErrorCode::TooManyConnections,
            ErrorCode::InternalError,
        ];

        for error_code in &error_codes {
            let description = error_code.description();
            assert!(
                description.len() > 10,
                "ErrorCode::{:?} has suspiciously short description: '{}'",
                error_code,
                description
            );
        }
    }

    #[test]
    fn test_serialization_format() {
        let json = serde_json::to_string(&ErrorCode::NotPaired).unwrap();
        assert_eq!(json, "\"NOT_PAIRED\"");
        let json = serde_json::to_string(&ErrorCode::InvalidProfile).unwrap();
        assert_eq!(json, "\"INVALID_PROFILE\"");
    }

    #[test]
    fn test_display_uses_description() {
        let error = ErrorCode::NotPaired;
        assert_eq!(format!("{}", error), error.description());
    }
}
