//! Registration payload normalization and message validation.

use std::collections::BTreeSet;

use super::messages::RegisterPayload;
use super::types::{AgeRange, Profile};

pub const MIN_AGE: u8 = 13;
pub const MAX_AGE: u8 = 120;

/// Hard cap for chat message text, in characters after trimming.
pub const MAX_MESSAGE_CHARS: usize = 1000;

const MAX_USERNAME_CHARS: usize = 32;
const MAX_INTERESTS: usize = 10;
const MAX_INTEREST_CHARS: usize = 30;
const MAX_PRIORITY: f64 = 5.0;

/// Turn a raw registration payload into a normalized [`Profile`].
///
/// Interests are trimmed, lowercased, deduplicated, and bounded; `age` and
/// `age_range` are clamped into [13, 120]; missing fields fall back to
/// defaults. Malformed required fields are rejected.
pub fn normalize_profile(payload: RegisterPayload) -> Result<Profile, String> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err("username must not be empty".to_string());
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(format!(
            "username must be at most {MAX_USERNAME_CHARS} characters"
        ));
    }

    let age = payload.age.clamp(MIN_AGE, MAX_AGE);

    let age_range = match payload.age_range {
        Some(range) => {
            if range.min > range.max {
                return Err(format!(
                    "ageRange.min ({}) must not exceed ageRange.max ({})",
                    range.min, range.max
                ));
            }
            AgeRange {
                min: range.min.clamp(MIN_AGE, MAX_AGE),
                max: range.max.clamp(MIN_AGE, MAX_AGE),
            }
        }
        None => AgeRange::default(),
    };

    let mut interests = BTreeSet::new();
    for raw in payload.interests {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() || tag.chars().count() > MAX_INTEREST_CHARS {
            continue;
        }
        interests.insert(tag);
        if interests.len() >= MAX_INTERESTS {
            break;
        }
    }

    let priority = match payload.priority {
        Some(p) if !p.is_finite() => {
            return Err("priority must be a finite number".to_string());
        }
        Some(p) => p.clamp(1.0, MAX_PRIORITY),
        None => 1.0,
    };

    Ok(Profile {
        username: username.to_string(),
        gender: payload.gender.unwrap_or_default(),
        age,
        interests,
        chat_mode: payload.chat_mode.unwrap_or_default(),
        gender_preference: payload.gender_preference.unwrap_or_default(),
        age_range,
        priority,
    })
}

/// Validate and normalize chat message text: trimmed, non-empty, capped at
/// [`MAX_MESSAGE_CHARS`].
pub fn normalize_message_text(text: &str) -> Result<String, MessageTextError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MessageTextError::Empty);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MessageTextError::TooLong);
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTextError {
    Empty,
    TooLong,
}
