//! WebSocket Handler
//!
//! Bridges one live feed subscription to one socket. The subscription is
//! cancelled when either side goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;
use crate::store::ReadingFeed;
use crate::subscription;

/// GET /api/ws/live
pub async fn live_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let _ = tx.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    let feed_tx = tx.clone();
    let mut live = state.store.subscribe_latest(subscription::sink(move |delivery| {
        if let Some(msg) = ServerMessage::from_delivery(delivery) {
            let _ = feed_tx.send(msg);
        }
    }));
    tracing::debug!(connection_id = %connection_id, "Live stream opened");

    let conn_id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let conn_id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&tx, &conn_id_for_recv, msg) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    live.cancel();
    tracing::debug!(connection_id = %connection_id, "Live stream closed");
}

/// Returns false if the connection should be closed.
fn handle_ws_message(
    tx: &mpsc::UnboundedSender<ServerMessage>,
    connection_id: &str,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    let _ = tx.send(ServerMessage::Pong);
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "Invalid client message"
                    );
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    });
                }
            }
            true
        }
        Message::Binary(_) => {
            let _ = tx.send(ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            });
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}
