//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake with the chat id
//! taken from the request path, the delegated authorization check, and
//! bidirectional communication with the gateway actor.
//!
//! Accepted connect paths:
//! - `/chat/{chatId}?user={participant}` — connect by pre-derived chat id
//! - `/chat/{a}/{b}?user={participant}` — derive the canonical id from
//!   two participants, then connect

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::chat_id::ChatId;
use crate::error::AppError;
use crate::gateway::{derive_chat_id, GatewayCommand};
use crate::message::ServerFrame;
use crate::room::OUTBOUND_QUEUE_CAPACITY;
use crate::types::{ConnectionId, ParticipantId};

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, runs the delegated authorization
/// check against the external collaborator, registers the connection with
/// the gateway, and manages the connection lifecycle. Reconnecting after
/// any failure simply runs this again.
pub async fn handle_connection<B: Backend>(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<GatewayCommand>,
    backend: Arc<B>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, capturing the request URI for routing
    let mut request_uri: Option<Uri> = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        request_uri = Some(req.uri().clone());
        Ok(resp)
    })
    .await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Resolve the target chat and participant, then authorize. On any
    // rejection, tell the client why before closing.
    let accepted = async {
        let uri = request_uri.as_ref().ok_or_else(|| {
            AppError::InvalidArgument("handshake carried no request URI".to_string())
        })?;
        let (chat_id, participant) = parse_connect_uri(uri)?;
        authorize(&*backend, chat_id, participant).await
    }
    .await;

    let (chat_id, participant) = match accepted {
        Ok(target) => target,
        Err(err) => {
            warn!("Connection from {} rejected: {}", peer_addr, err);
            let json = serde_json::to_string(&ServerFrame::from(&err))?;
            let _ = ws_sender.send(Message::Text(json.into())).await;
            let _ = ws_sender.close().await;
            return Err(err);
        }
    };

    // Generate connection ID
    let connection_id = ConnectionId::new();
    info!(
        "Connection {} from {} joining chat {} as {}",
        connection_id, peer_addr, chat_id, participant
    );

    // Bounded queue for gateway -> client frames
    let (frame_tx, mut frame_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_QUEUE_CAPACITY);

    // Register with the gateway
    if cmd_tx
        .send(GatewayCommand::Connect {
            connection_id,
            chat_id: chat_id.clone(),
            participant,
            sender: frame_tx,
        })
        .await
        .is_err()
    {
        error!(
            "Failed to register connection {} - gateway closed",
            connection_id
        );
        return Err(AppError::ChannelSend);
    }

    // Send connection success frame
    let connected = ServerFrame::Connected {
        chat_id: chat_id.to_string(),
        connection_id: connection_id.to_string(),
    };
    let json = serde_json::to_string(&connected)?;
    ws_sender.send(Message::Text(json.into())).await?;

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> GatewayCommand)
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    // Inbound frames are message bodies verbatim; the only
                    // shape requirement is non-emptiness.
                    if text.trim().is_empty() {
                        warn!("Empty message body from {}, ignoring", connection_id);
                        continue;
                    }
                    if cmd_tx_read
                        .send(GatewayCommand::Message {
                            connection_id,
                            body: text.to_string(),
                        })
                        .await
                        .is_err()
                    {
                        debug!("Gateway closed, ending read task for {}", connection_id);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", connection_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", connection_id);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", connection_id);
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", connection_id);
    });

    // Spawn write task (ServerFrame -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize frame: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", connection_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", connection_id);
        }
    }

    // Prompt removal from the room: stop receiving broadcasts and stop
    // counting toward the empty-room decision.
    let _ = cmd_tx
        .send(GatewayCommand::Disconnect { connection_id })
        .await;

    info!("Connection {} closed", connection_id);

    Ok(())
}

/// Run the delegated authorization check for a parsed connect target
async fn authorize<B: Backend>(
    backend: &B,
    chat_id: ChatId,
    participant: ParticipantId,
) -> Result<(ChatId, ParticipantId), AppError> {
    match backend.user_exists(&participant).await {
        Ok(true) => Ok((chat_id, participant)),
        Ok(false) => Err(AppError::ConnectionRejected(format!(
            "unknown participant '{}'",
            participant
        ))),
        Err(err) => {
            warn!("Authorization check for {} failed: {}", participant, err);
            Err(AppError::ConnectionRejected(
                "authorization check unavailable".to_string(),
            ))
        }
    }
}

/// Extract the chat id and participant from a connect request URI.
///
/// Identifiers are taken as-is from the path and query; no percent
/// decoding is applied.
fn parse_connect_uri(uri: &Uri) -> Result<(ChatId, ParticipantId), AppError> {
    let path = uri.path();
    let rest = path.strip_prefix("/chat/").ok_or_else(|| {
        AppError::InvalidArgument(format!("unknown path '{}', expected /chat/...", path))
    })?;

    let segments: Vec<&str> = rest.split('/').collect();
    let chat_id = match segments.as_slice() {
        [chat_id] => ChatId::from_string(*chat_id)?,
        [a, b] => derive_chat_id(a, b)?,
        _ => {
            return Err(AppError::InvalidArgument(
                "expected /chat/{chatId} or /chat/{a}/{b}".to_string(),
            ))
        }
    };

    let user = uri
        .query()
        .and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "user")
                .map(|(_, value)| value)
        })
        .ok_or_else(|| {
            AppError::InvalidArgument("missing 'user' query parameter".to_string())
        })?;
    let participant = ParticipantId::new(user)?;

    Ok((chat_id, participant))
}
