//! Canonical chat id derivation
//!
//! A two-party conversation is keyed by a single canonical string derived
//! from the unordered pair of participants. The scheme: order the two ids
//! by lexicographic byte order, then join them with `':'`. The separator
//! cannot appear in a `ParticipantId`, so distinct pairs never collide
//! (`resolve("ab","c")` and `resolve("a","bc")` differ). The stored chat
//! ids on the external platform must use the same scheme for lookups to
//! succeed.

use crate::error::AppError;
use crate::types::{ParticipantId, CHAT_ID_SEPARATOR};

/// Canonical identifier for a two-party conversation
///
/// Order-independent: `resolve(a, b) == resolve(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId(String);

impl ChatId {
    /// Derive the canonical chat id for an unordered pair of participants.
    ///
    /// Pure and deterministic: no randomness, no timestamps. Fails with
    /// `InvalidArgument` when either raw id is empty.
    pub fn resolve(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (lo, hi) = if a.as_str().as_bytes() <= b.as_str().as_bytes() {
            (a, b)
        } else {
            (b, a)
        };
        Self(format!("{}{}{}", lo, CHAT_ID_SEPARATOR, hi))
    }

    /// Accept an opaque pre-derived chat id (e.g. from a connect path).
    ///
    /// The core treats it as an opaque key; only non-emptiness is enforced.
    pub fn from_string(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(AppError::InvalidArgument(
                "chat id must not be empty".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// The raw key string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
