//! Room: in-memory fan-out group for one chat id
//!
//! Holds the currently connected member channels and delivers frames to
//! all of them. Delivery is best-effort per member: a failed handoff
//! removes that member (implicit leave) without aborting delivery to the
//! rest. A Room is exclusively owned by the registry inside the gateway
//! actor, so all mutation is serialized.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::warn;

use crate::chat_id::ChatId;
use crate::error::DeliveryError;
use crate::message::ServerFrame;
use crate::types::{ConnectionId, ParticipantId};

/// Capacity of each member's bounded outbound queue.
///
/// A full queue marks the member as a failed delivery rather than
/// blocking fan-out to the others.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// A registered member connection
#[derive(Debug)]
struct Member {
    participant: ParticipantId,
    sender: mpsc::Sender<ServerFrame>,
}

/// Fan-out group of connections sharing a chat id
#[derive(Debug)]
pub struct Room {
    /// Chat id this room serves
    chat_id: ChatId,
    /// Members keyed by connection identity
    members: HashMap<ConnectionId, Member>,
    /// Next arrival-order number for messages in this room
    next_seq: u64,
}

impl Room {
    /// Create an empty room for the given chat id
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            members: HashMap::new(),
            next_seq: 0,
        }
    }

    /// The chat id this room serves
    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    /// Register a connection as a member.
    ///
    /// Keyed by connection identity: joining twice with the same
    /// connection id replaces the entry, so there is no duplicate
    /// delivery.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        participant: ParticipantId,
        sender: mpsc::Sender<ServerFrame>,
    ) {
        self.members.insert(
            connection_id,
            Member {
                participant,
                sender,
            },
        );
    }

    /// Remove a connection from the member set.
    ///
    /// Returns true when the room is now empty, the caller's signal to
    /// evict it from the registry.
    pub fn leave(&mut self, connection_id: ConnectionId) -> bool {
        self.members.remove(&connection_id);
        self.members.is_empty()
    }

    /// Whether the given connection is a member
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.members.contains_key(&connection_id)
    }

    /// The participant that opened the given connection
    pub fn participant(&self, connection_id: ConnectionId) -> Option<&ParticipantId> {
        self.members.get(&connection_id).map(|m| &m.participant)
    }

    /// Number of registered members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Claim the next arrival-order number for a message in this room
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Deliver a frame to every member except `exclude`.
    ///
    /// Non-blocking bounded handoff per member: a closed or full outbound
    /// queue is a delivery failure, the member is removed, and delivery to
    /// the remaining members continues. Frames handed off by successive
    /// `broadcast` calls reach each surviving member in call order, since
    /// the owning actor invokes this sequentially and each queue is FIFO.
    ///
    /// Returns the connections that failed and were removed.
    pub fn broadcast(
        &mut self,
        frame: &ServerFrame,
        exclude: Option<ConnectionId>,
    ) -> Vec<ConnectionId> {
        let mut failed = Vec::new();

        for (&connection_id, member) in &self.members {
            if Some(connection_id) == exclude {
                continue;
            }
            if let Err(err) = Self::deliver(member, frame.clone()) {
                warn!(
                    "Delivery to {} ({}) in room {} failed: {}",
                    connection_id, member.participant, self.chat_id, err
                );
                failed.push(connection_id);
            }
        }

        for connection_id in &failed {
            self.members.remove(connection_id);
        }

        failed
    }

    /// Hand a frame to one member's outbound queue without blocking
    fn deliver(member: &Member, frame: ServerFrame) -> Result<(), DeliveryError> {
        member.sender.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Closed(_) => DeliveryError::QueueClosed,
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::Receiver;

    fn chat_id() -> ChatId {
        ChatId::from_string("alice:bob").unwrap()
    }

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn member_channel() -> (mpsc::Sender<ServerFrame>, Receiver<ServerFrame>) {
        mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
    }

    fn frame(body: &str) -> ServerFrame {
        ServerFrame::Chat {
            from: "alice".to_string(),
            body: body.to_string(),
            seq: 0,
        }
    }

    fn body_of(frame: &ServerFrame) -> &str {
        match frame {
            ServerFrame::Chat { body, .. } => body,
            other => panic!("expected chat frame, got {:?}", other),
        }
    }

    #[test]
    fn test_join_and_leave() {
        let mut room = Room::new(chat_id());
        let conn1 = ConnectionId::new();
        let conn2 = ConnectionId::new();
        let (tx1, _rx1) = member_channel();
        let (tx2, _rx2) = member_channel();

        assert!(room.is_empty());
        room.join(conn1, pid("alice"), tx1);
        room.join(conn2, pid("bob"), tx2);
        assert_eq!(room.member_count(), 2);
        assert!(room.contains(conn1));
        assert_eq!(room.participant(conn1), Some(&pid("alice")));

        assert!(!room.leave(conn1));
        assert!(room.leave(conn2), "second leave must report empty");
        assert!(room.is_empty());
    }

    #[test]
    fn test_join_idempotent_by_connection() {
        let mut room = Room::new(chat_id());
        let conn = ConnectionId::new();
        let (tx_old, _rx_old) = member_channel();
        let (tx_new, mut rx_new) = member_channel();

        room.join(conn, pid("alice"), tx_old);
        room.join(conn, pid("alice"), tx_new);
        assert_eq!(room.member_count(), 1);

        // One member, one delivery: only the latest channel receives.
        let failed = room.broadcast(&frame("hi"), None);
        assert!(failed.is_empty());
        assert_eq!(body_of(&rx_new.try_recv().unwrap()), "hi");
        assert!(rx_new.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut room = Room::new(chat_id());
        let conn1 = ConnectionId::new();
        let conn2 = ConnectionId::new();
        let (tx1, mut rx1) = member_channel();
        let (tx2, mut rx2) = member_channel();
        room.join(conn1, pid("alice"), tx1);
        room.join(conn2, pid("bob"), tx2);

        let failed = room.broadcast(&frame("hi"), Some(conn1));
        assert!(failed.is_empty());
        assert_eq!(body_of(&rx2.try_recv().unwrap()), "hi");
        assert!(rx1.try_recv().is_err(), "sender must not receive its own message");
    }

    #[test]
    fn test_broadcast_without_exclusion_reaches_all() {
        let mut room = Room::new(chat_id());
        let conn1 = ConnectionId::new();
        let conn2 = ConnectionId::new();
        let (tx1, mut rx1) = member_channel();
        let (tx2, mut rx2) = member_channel();
        room.join(conn1, pid("alice"), tx1);
        room.join(conn2, pid("bob"), tx2);

        room.broadcast(&frame("hi"), None);
        assert_eq!(body_of(&rx1.try_recv().unwrap()), "hi");
        assert_eq!(body_of(&rx2.try_recv().unwrap()), "hi");
    }

    #[test]
    fn test_broadcast_order_preserved() {
        let mut room = Room::new(chat_id());
        let conn = ConnectionId::new();
        let (tx, mut rx) = member_channel();
        room.join(conn, pid("bob"), tx);

        room.broadcast(&frame("first"), None);
        room.broadcast(&frame("second"), None);
        room.broadcast(&frame("third"), None);

        assert_eq!(body_of(&rx.try_recv().unwrap()), "first");
        assert_eq!(body_of(&rx.try_recv().unwrap()), "second");
        assert_eq!(body_of(&rx.try_recv().unwrap()), "third");
    }

    #[test]
    fn test_delivery_failure_is_isolated() {
        let mut room = Room::new(chat_id());
        let alive1 = ConnectionId::new();
        let dead = ConnectionId::new();
        let alive2 = ConnectionId::new();
        let (tx1, mut rx1) = member_channel();
        let (tx_dead, rx_dead) = member_channel();
        let (tx2, mut rx2) = member_channel();
        room.join(alive1, pid("u1"), tx1);
        room.join(dead, pid("u2"), tx_dead);
        room.join(alive2, pid("u3"), tx2);

        // Peer vanished: its receiving end is gone.
        drop(rx_dead);

        let failed = room.broadcast(&frame("hi"), None);
        assert_eq!(failed, vec![dead]);
        assert_eq!(body_of(&rx1.try_recv().unwrap()), "hi");
        assert_eq!(body_of(&rx2.try_recv().unwrap()), "hi");

        // Failing member no longer counted or delivered to.
        assert_eq!(room.member_count(), 2);
        assert!(!room.contains(dead));
        let failed = room.broadcast(&frame("again"), None);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_full_queue_counts_as_failure() {
        let mut room = Room::new(chat_id());
        let slow = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(1);
        room.join(slow, pid("slow"), tx);

        assert!(room.broadcast(&frame("one"), None).is_empty());
        let failed = room.broadcast(&frame("two"), None);
        assert_eq!(failed, vec![slow]);
        assert!(room.is_empty());
    }

    #[test]
    fn test_next_seq_monotonic() {
        let mut room = Room::new(chat_id());
        assert_eq!(room.next_seq(), 0);
        assert_eq!(room.next_seq(), 1);
        assert_eq!(room.next_seq(), 2);
    }
}
