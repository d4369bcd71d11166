//! Error types for the relay core
//!
//! Defines application-level errors and per-connection delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// rejections reported back to the connecting client.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Malformed identifier or request shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Authorization delegated upstream said no
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),
}

/// Per-connection delivery errors
///
/// Raised when a frame cannot be handed to a member's outbound queue.
/// Non-fatal: the affected member is removed and fan-out continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving end of the outbound queue has been closed
    #[error("Outbound queue closed")]
    QueueClosed,

    /// The bounded outbound queue is full (slow consumer)
    #[error("Outbound queue full")]
    QueueFull,
}
