use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connected peer, allocated per connection.
pub type PeerId = Uuid;

/// Server-assigned identifier for a pair. Unpredictable: millisecond
/// timestamp plus 64 bits of randomness (see [`crate::protocol::room_ids`]).
pub type RoomId = String;

/// Identifier for a WebRTC call inside a pair.
pub type CallId = Uuid;

/// Declared gender of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    NotSpecified,
}

impl Gender {
    /// Whether the peer declared a concrete gender.
    pub fn is_specified(self) -> bool {
        self != Gender::NotSpecified
    }
}

/// Which partner genders a peer is willing to match with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GenderPreference {
    #[default]
    Any,
    Male,
    Female,
    Other,
}

impl GenderPreference {
    /// Whether a partner with the given gender satisfies this preference.
    /// `Any` accepts everything, including unspecified genders.
    pub fn accepts(self, gender: Gender) -> bool {
        match self {
            GenderPreference::Any => true,
            GenderPreference::Male => gender == Gender::Male,
            GenderPreference::Female => gender == Gender::Female,
            GenderPreference::Other => gender == Gender::Other,
        }
    }
}

/// Desired chat mode. Pairs are strictly mode-homogeneous: a video seeker is
/// never paired with a text seeker, even when no video partner exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Text,
    Video,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Text => write!(f, "text"),
            ChatMode::Video => write!(f, "video"),
        }
    }
}

/// Acceptable partner age range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl Default for AgeRange {
    fn default() -> Self {
        Self {
            min: crate::protocol::validation::MIN_AGE,
            max: crate::protocol::validation::MAX_AGE,
        }
    }
}

impl AgeRange {
    pub fn contains(&self, age: u8) -> bool {
        age >= self.min && age <= self.max
    }
}

/// Normalized peer profile. Immutable after registration except for
/// `chat_mode`, which may be re-set when a new search starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub gender: Gender,
    pub age: u8,
    /// Lowercase-normalized, deduplicated interest tags.
    pub interests: BTreeSet<String>,
    pub chat_mode: ChatMode,
    pub gender_preference: GenderPreference,
    pub age_range: AgeRange,
    /// 1.0 baseline; above 1.0 for premium peers. Used as a selection
    /// multiplier and for tie-breaking.
    pub priority: f64,
}

impl Profile {
    /// Whether this peer is treated as premium for scoring purposes.
    pub fn is_premium(&self) -> bool {
        self.priority > 1.0
    }

    /// Interests shared with another profile, in stable order.
    pub fn shared_interests(&self, other: &Profile) -> Vec<String> {
        self.interests.intersection(&other.interests).cloned().collect()
    }
}

/// Why a pair was torn down. Delivered to the surviving side in
/// `partnerDisconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownReason {
    NextRequested,
    ManualDisconnect,
    NewSearch,
    Inactive,
    Disconnected,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeardownReason::NextRequested => "next_requested",
            TeardownReason::ManualDisconnect => "manual_disconnect",
            TeardownReason::NewSearch => "new_search",
            TeardownReason::Inactive => "inactive",
            TeardownReason::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle of a call record inside a pair. The server never inspects the
/// SDP or ICE payloads themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Offered,
    Incoming,
    Answered,
    Rejected,
    Ended,
}

impl CallStatus {
    /// Statuses counted as "active call" in stats.
    pub fn is_active(self) -> bool {
        matches!(self, CallStatus::Offered | CallStatus::Answered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_preference_accepts() {
        assert!(GenderPreference::Any.accepts(Gender::Male));
        assert!(GenderPreference::Any.accepts(Gender::NotSpecified));
        assert!(GenderPreference::Female.accepts(Gender::Female));
        assert!(!GenderPreference::Female.accepts(Gender::Male));
        assert!(!GenderPreference::Other.accepts(Gender::NotSpecified));
    }

    #[test]
    fn age_range_is_inclusive() {
        let range = AgeRange { min: 20, max: 30 };
        assert!(range.contains(20));
        assert!(range.contains(30));
        assert!(!range.contains(19));
        assert!(!range.contains(31));
    }

    #[test]
    fn teardown_reason_wire_format() {
        let json = serde_json::to_string(&TeardownReason::NextRequested).unwrap();
        assert_eq!(json, "\"next_requested\"");
        let json = serde_json::to_string(&TeardownReason::ManualDisconnect).unwrap();
        assert_eq!(json, "\"manual_disconnect\"");
    }

    #[test]
    fn chat_mode_wire_format() {
        assert_eq!(serde_json::to_string(&ChatMode::Video).unwrap(), "\"video\"");
        assert_eq!(serde_json::to_string(&ChatMode::Text).unwrap(), "\"text\"");
    }

    #[test]
    fn shared_interests_are_sorted() {
        let mut a = BTreeSet::new();
        a.insert("music".to_string());
        a.insert("travel".to_string());
        let mut b = BTreeSet::new();
        b.insert("travel".to_string());
        b.insert("music".to_string());
        b.insert("games".to_string());

        let profile_a = Profile {
            username: "a".to_string(),
            gender: Gender::NotSpecified,
            age: 25,
            interests: a,
            chat_mode: ChatMode::Text,
            gender_preference: GenderPreference::Any,
            age_range: AgeRange::default(),
            priority: 1.0,
        };
        let profile_b = Profile {
            interests: b,
            ..profile_a.clone()
        };

        assert_eq!(profile_a.shared_interests(&profile_b), vec!["music", "travel"]);
    }
}
