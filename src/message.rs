//! Message and frame definitions
//!
//! Inbound text frames are message bodies verbatim; there is no inbound
//! schema beyond non-emptiness. Outbound frames are JSON, using Serde's
//! tagged enum for type-safe serialization.

use serde::Serialize;

use crate::chat_id::ChatId;
use crate::error::AppError;
use crate::types::ParticipantId;

/// A relayed chat message
///
/// Ephemeral: delivered only to connections present in the room at
/// broadcast time. Retention is the external collaborator's concern.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Conversation the message belongs to
    pub chat_id: ChatId,
    /// Participant that sent it
    pub sender: ParticipantId,
    /// Verbatim message body
    pub body: String,
    /// Per-room arrival order
    pub seq: u64,
}

/// Server → Client frame
///
/// Serialized to a JSON text frame by the connection's write task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Connection accepted and registered in a room
    Connected {
        chat_id: String,
        connection_id: String,
    },
    /// Chat message from the other participant
    Chat { from: String, body: String, seq: u64 },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

impl ServerFrame {
    /// Build the outbound frame for a relayed message
    pub fn chat(msg: &ChatMessage) -> Self {
        Self::Chat {
            from: msg.sender.to_string(),
            body: msg.body.clone(),
            seq: msg.seq,
        }
    }
}

/// Error codes for ServerFrame::Error
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed identifier or request shape
    InvalidArgument,
    /// Upstream authorization said no
    ConnectionRejected,
    /// Frame could not be handled
    InvalidMessage,
}

/// Convert AppError to a ServerFrame for client notification
impl From<&AppError> for ServerFrame {
    fn from(err: &AppError) -> Self {
        let (code, message) = match err {
            AppError::InvalidArgument(detail) => (ErrorCode::InvalidArgument, detail.clone()),
            AppError::ConnectionRejected(detail) => {
                (ErrorCode::ConnectionRejected, detail.clone())
            }
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::InvalidMessage, "Internal error".to_string()),
        };
        ServerFrame::Error { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_frame_serialize() {
        let msg = ChatMessage {
            chat_id: ChatId::from_string("alice:bob").unwrap(),
            sender: ParticipantId::new("alice").unwrap(),
            body: "hello".to_string(),
            seq: 3,
        };
        let json = serde_json::to_string(&ServerFrame::chat(&msg)).unwrap();
        assert!(json.contains("\"type\":\"chat\""));
        assert!(json.contains("\"from\":\"alice\""));
        assert!(json.contains("\"body\":\"hello\""));
        assert!(json.contains("\"seq\":3"));
    }

    #[test]
    fn test_error_frame_from_app_error() {
        let err = AppError::ConnectionRejected("unknown user".to_string());
        let json = serde_json::to_string(&ServerFrame::from(&err)).unwrap();
        assert!(json.contains("\"code\":\"connection_rejected\""));
        assert!(json.contains("unknown user"));
    }
}
