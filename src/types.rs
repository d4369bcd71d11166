//! Basic type definitions for the relay core
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based unique connection identifier
//! - `ParticipantId`: validated user identifier

use uuid::Uuid;

use crate::error::AppError;

/// Separator used when deriving a canonical chat id from two participants.
///
/// `ParticipantId` construction rejects identifiers containing it, so the
/// derived key is collision free across distinct pairs.
pub const CHAT_ID_SEPARATOR: char = ':';

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque participant identifier (username or user id)
///
/// Must be non-empty and must not contain the chat-id separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Validate and wrap a raw identifier
    pub fn new(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(AppError::InvalidArgument(
                "participant id must not be empty".to_string(),
            ));
        }
        if raw.contains(CHAT_ID_SEPARATOR) {
            return Err(AppError::InvalidArgument(format!(
                "participant id must not contain '{}'",
                CHAT_ID_SEPARATOR
            )));
        }
        Ok(Self(raw))
    }

    /// The raw identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_participant_id_valid() {
        let id = ParticipantId::new("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn test_participant_id_empty_rejected() {
        assert!(matches!(
            ParticipantId::new(""),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_participant_id_separator_rejected() {
        assert!(matches!(
            ParticipantId::new("al:ice"),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
