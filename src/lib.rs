//! Realtime relay core for two-party chats
//!
//! Derives a canonical, order-independent chat id for a pair of
//! participants and fans messages out over WebSocket connections grouped
//! into rooms. Authentication, user records, and message retention live
//! on an external hosted platform reached through the narrow [`Backend`]
//! trait; this crate owns only the realtime path.
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatGateway` is the single task owning the room registry and the
//!   connection index
//! - Each connection has a `handler` task communicating with the gateway
//! - No locks needed - all state access goes through message passing
//!
//! Fan-out is best-effort per member: a connection whose bounded outbound
//! queue is closed or full is dropped from its room, and delivery to the
//! remaining members continues. Rooms are created on first connect and
//! evicted when their last member leaves.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use pairchat::{handle_connection, ChatGateway, RestBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(RestBackend::new("https://platform.example", "key"));
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatGateway::new(cmd_rx, Arc::clone(&backend)).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, cmd_tx.clone(), Arc::clone(&backend)));
//!     }
//! }
//! ```

pub mod backend;
pub mod chat_id;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod types;

// Re-export main types for convenience
pub use backend::{Backend, BackendError, MessageId, RestBackend, StoredMessage};
pub use chat_id::ChatId;
pub use config::Config;
pub use error::{AppError, DeliveryError};
pub use gateway::{derive_chat_id, ChatGateway, GatewayCommand};
pub use handler::handle_connection;
pub use message::{ChatMessage, ErrorCode, ServerFrame};
pub use registry::RoomRegistry;
pub use room::Room;
pub use types::{ConnectionId, ParticipantId};
