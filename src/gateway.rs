//! ChatGateway actor
//!
//! The single task that owns all realtime state: the room registry and
//! the connection → chat-id index. Connection handlers talk to it over an
//! mpsc command channel; mutations are serialized by the actor, so no
//! locks are needed and at most one room ever exists per chat id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::chat_id::ChatId;
use crate::error::AppError;
use crate::message::{ChatMessage, ServerFrame};
use crate::registry::RoomRegistry;
use crate::types::{ConnectionId, ParticipantId};

/// Commands sent from connection handlers to the gateway actor
#[derive(Debug)]
pub enum GatewayCommand {
    /// New authorized connection for a chat
    Connect {
        connection_id: ConnectionId,
        chat_id: ChatId,
        participant: ParticipantId,
        sender: mpsc::Sender<ServerFrame>,
    },
    /// Inbound message body from a connection
    Message {
        connection_id: ConnectionId,
        body: String,
    },
    /// Connection closed
    Disconnect { connection_id: ConnectionId },
}

/// Derive the canonical chat id for two participants.
///
/// Pure, no I/O; independent of whether a room currently exists for the
/// pair. Fails with `InvalidArgument` on a malformed identifier.
pub fn derive_chat_id(a: &str, b: &str) -> Result<ChatId, AppError> {
    let a = ParticipantId::new(a)?;
    let b = ParticipantId::new(b)?;
    Ok(ChatId::resolve(&a, &b))
}

/// The gateway actor
///
/// Processes commands from connection handlers, fans messages out through
/// rooms, and forwards persistence to the external collaborator without
/// ever blocking on it.
pub struct ChatGateway<B: Backend> {
    /// Active rooms, created on first connect and evicted when empty
    registry: RoomRegistry,
    /// Which chat each live connection belongs to
    connections: HashMap<ConnectionId, ChatId>,
    /// External collaborator for fire-and-forget persistence
    backend: Arc<B>,
    /// Command receiver channel
    receiver: mpsc::Receiver<GatewayCommand>,
}

impl<B: Backend> ChatGateway<B> {
    /// Create a gateway with the given command receiver and collaborator
    pub fn new(receiver: mpsc::Receiver<GatewayCommand>, backend: Arc<B>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            connections: HashMap::new(),
            backend,
            receiver,
        }
    }

    /// Run the gateway event loop
    ///
    /// Continuously receives and processes commands until all senders are
    /// dropped.
    pub async fn run(mut self) {
        info!("ChatGateway started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatGateway shutting down");
    }

    fn handle_command(&mut self, cmd: GatewayCommand) {
        match cmd {
            GatewayCommand::Connect {
                connection_id,
                chat_id,
                participant,
                sender,
            } => {
                self.handle_connect(connection_id, chat_id, participant, sender);
            }
            GatewayCommand::Message {
                connection_id,
                body,
            } => {
                self.handle_message(connection_id, body);
            }
            GatewayCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id);
            }
        }
    }

    /// Register a connection in its room, creating the room on first use
    fn handle_connect(
        &mut self,
        connection_id: ConnectionId,
        chat_id: ChatId,
        participant: ParticipantId,
        sender: mpsc::Sender<ServerFrame>,
    ) {
        info!(
            "Connection {} ({}) joined chat {}",
            connection_id, participant, chat_id
        );

        let room = self.registry.get_or_create(&chat_id);
        room.join(connection_id, participant, sender);
        self.connections.insert(connection_id, chat_id);

        debug!(
            "Total connections: {}, Total rooms: {}",
            self.connections.len(),
            self.registry.len()
        );
    }

    /// Fan an inbound message out to the sender's room and forward it to
    /// the collaborator fire-and-forget
    fn handle_message(&mut self, connection_id: ConnectionId, body: String) {
        let Some(chat_id) = self.connections.get(&connection_id).cloned() else {
            warn!("Message from unregistered connection {}", connection_id);
            return;
        };
        let Some(room) = self.registry.get_mut(&chat_id) else {
            return;
        };
        let Some(sender) = room.participant(connection_id).cloned() else {
            return;
        };

        let message = ChatMessage {
            chat_id: chat_id.clone(),
            sender,
            body,
            seq: room.next_seq(),
        };

        // No echo back to the sender's own connection. The room cannot go
        // empty here: the sender is excluded and stays a member.
        let failed = room.broadcast(&ServerFrame::chat(&message), Some(connection_id));
        for dropped in failed {
            self.connections.remove(&dropped);
        }

        self.persist(message);
    }

    /// Remove a connection from its room; evict the room if now empty
    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        let Some(chat_id) = self.connections.remove(&connection_id) else {
            return;
        };

        info!("Connection {} left chat {}", connection_id, chat_id);

        if let Some(room) = self.registry.get_mut(&chat_id) {
            if room.leave(connection_id) {
                self.registry.remove(&chat_id);
            }
        }

        debug!(
            "Total connections: {}, Total rooms: {}",
            self.connections.len(),
            self.registry.len()
        );
    }

    /// Forward a message to the collaborator without blocking the actor.
    ///
    /// Failures are logged only; the broadcast has already happened.
    fn persist(&self, message: ChatMessage) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(err) = backend
                .persist_message(&message.chat_id, &message.sender, &message.body)
                .await
            {
                warn!(
                    "Failed to persist message {} in chat {}: {}",
                    message.seq, message.chat_id, err
                );
            }
        });
    }
}
