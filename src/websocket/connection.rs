use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::server::{ChatServer, RegisterClientError};
use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::sending::{send_immediate_server_message, send_text_message};

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<ChatServer>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let queue_capacity = server.config().outbound_queue_capacity.max(1);
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(queue_capacity);

    // Register client with server
    let peer_id = match server.register_client(tx, addr) {
        Ok(peer_id) => {
            tracing::info!(%peer_id, client_addr = %addr, "WebSocket connection established");
            peer_id
        }
        Err(RegisterClientError::IpLimitExceeded { current, limit }) => {
            let error_message = ServerMessage::Error {
                message: format!("Too many connections from your IP ({current}/{limit})"),
                error_code: Some(ErrorCode::TooManyConnections),
            };
            if let Err(err) = send_immediate_server_message(&mut sender, &error_message).await {
                tracing::debug!(
                    client_addr = %addr,
                    error = %err,
                    "Failed to send IP limit error frame"
                );
            }
            let _ = futures_util::SinkExt::close(&mut sender).await;
            return;
        }
    };

    // Every log line emitted inside the connection tasks carries the peer
    // identity through this span instead of repeating it per call site.
    let peer_span = tracing::info_span!("peer", %peer_id, client_addr = %addr);

    // Outgoing messages: drain the queue until the server drops our sender
    // or the socket dies.
    let send_server = server.clone();
    let send_task = tokio::spawn(
        async move {
            while let Some(message) = rx.recv().await {
                if send_text_message(&mut sender, &message, &peer_id).await.is_err() {
                    break;
                }
            }
            send_server.unregister_client(&peer_id).await;
        }
        .instrument(peer_span.clone()),
    );

    // Incoming messages: parse and dispatch serially, one event at a time
    // per connection.
    let recv_server = server.clone();
    let receive_task = tokio::spawn(
        async move {
            while let Some(msg) = receiver.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        let max_size = recv_server.config().max_message_size;
                        if text.len() > max_size {
                            tracing::warn!(
                                size = text.len(),
                                max = max_size,
                                "Message exceeds size limit"
                            );
                            recv_server.send_error_to_peer(
                                &peer_id,
                                format!(
                                    "Message too large ({} bytes, max {} bytes)",
                                    text.len(),
                                    max_size
                                ),
                                Some(ErrorCode::MessageTooLarge),
                            );
                            continue;
                        }

                        let client_message: ClientMessage = match serde_json::from_str(&text) {
                            Ok(message) => message,
                            Err(err) => {
                                tracing::warn!(error = %err, "Rejected malformed client frame");
                                recv_server.metrics().increment_validation_errors();
                                recv_server.send_error_to_peer(
                                    &peer_id,
                                    ErrorCode::InvalidMessage.description().to_string(),
                                    Some(ErrorCode::InvalidMessage),
                                );
                                continue;
                            }
                        };

                        recv_server.handle_client_message(&peer_id, client_message).await;
                    }
                    Message::Binary(_) => {
                        // The protocol is JSON text frames only
                        recv_server.send_error_to_peer(
                            &peer_id,
                            "Binary frames are not supported".to_string(),
                            Some(ErrorCode::InvalidMessage),
                        );
                    }
                    Message::Close(_) => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {
                        // Keep the inactivity sweep honest even when the client
                        // only speaks protocol-level keepalives.
                        recv_server.touch_peer(&peer_id);
                    }
                }
            }

            recv_server.unregister_client(&peer_id).await;
        }
        .instrument(peer_span),
    );

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {
            tracing::debug!(%peer_id, "Send task completed");
        }
        _ = receive_task => {
            tracing::debug!(%peer_id, "Receive task completed");
        }
    }

    // Ensure cleanup
    server.unregister_client(&peer_id).await;
}
