//! Process-wide directory of active rooms
//!
//! Maps chat ids to live rooms. Initialized empty at process start, never
//! persisted. Exclusively owned by the gateway actor, which serializes all
//! calls, so two concurrent connects for the same chat id cannot create
//! two distinct rooms.

use std::collections::HashMap;

use tracing::debug;

use crate::chat_id::ChatId;
use crate::room::Room;

/// ChatId → Room map with create-on-first-use and evict-when-empty
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<ChatId, Room>,
}

impl RoomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Return the room for a chat id, creating it on first use.
    ///
    /// Infallible in-memory operation.
    pub fn get_or_create(&mut self, chat_id: &ChatId) -> &mut Room {
        self.rooms
            .entry(chat_id.clone())
            .or_insert_with(|| Room::new(chat_id.clone()))
    }

    /// Look up an existing room
    pub fn get_mut(&mut self, chat_id: &ChatId) -> Option<&mut Room> {
        self.rooms.get_mut(chat_id)
    }

    /// Remove the room only if it is currently empty, else no-op.
    ///
    /// The emptiness re-check protects against a join racing with an
    /// empty-room eviction.
    pub fn remove(&mut self, chat_id: &ChatId) {
        if let Some(room) = self.rooms.get(chat_id) {
            if room.is_empty() {
                self.rooms.remove(chat_id);
                debug!("Room {} deleted (empty)", chat_id);
            }
        }
    }

    /// Whether a room currently exists for the chat id
    pub fn contains(&self, chat_id: &ChatId) -> bool {
        self.rooms.contains_key(chat_id)
    }

    /// Number of active rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no rooms are active
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::OUTBOUND_QUEUE_CAPACITY;
    use crate::types::{ConnectionId, ParticipantId};
    use tokio::sync::mpsc;

    fn chat_id(s: &str) -> ChatId {
        ChatId::from_string(s).unwrap()
    }

    #[test]
    fn test_get_or_create_creates_once() {
        let mut registry = RoomRegistry::new();
        let id = chat_id("alice:bob");
        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        registry
            .get_or_create(&id)
            .join(conn, ParticipantId::new("alice").unwrap(), tx);
        assert_eq!(registry.len(), 1);

        // Second call returns the same room, not a fresh one.
        let room = registry.get_or_create(&id);
        assert_eq!(room.member_count(), 1);
        assert!(room.contains(conn));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_ids_distinct_rooms() {
        let mut registry = RoomRegistry::new();
        registry.get_or_create(&chat_id("alice:bob"));
        registry.get_or_create(&chat_id("alice:carol"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_only_when_empty() {
        let mut registry = RoomRegistry::new();
        let id = chat_id("alice:bob");
        let conn = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        registry
            .get_or_create(&id)
            .join(conn, ParticipantId::new("alice").unwrap(), tx);

        // Occupied room survives a remove attempt.
        registry.remove(&id);
        assert!(registry.contains(&id));

        let now_empty = registry.get_mut(&id).unwrap().leave(conn);
        assert!(now_empty);
        registry.remove(&id);
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut registry = RoomRegistry::new();
        registry.remove(&chat_id("no:such"));
        assert!(registry.is_empty());
    }
}
