//! WebSocket transport glue: one task pair per admitted connection.
//!
//! Admission (token verification) happens before the upgrade, in the HTTP
//! handler. By the time a socket reaches here it already has an identity.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::metrics::ServerMetrics;
use crate::models::Identity;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use crate::ws::registry::ConnectionId;
use crate::ws::router::EventRouter;

pub async fn handle_socket(
    socket: WebSocket,
    identity: Identity,
    router: Arc<EventRouter>,
    metrics: Arc<ServerMetrics>,
) {
    let conn = ConnectionId::new();
    info!(conn_id = %conn, user_id = %identity.user_id, username = %identity.username, "WebSocket connected");

    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound queue: the router and other connections' fan-out write here.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    router.registry().register(conn, identity, tx.clone()).await;

    let sender_task = async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!(conn_id = %conn, "Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    };

    let router_input = router.clone();
    let metrics_input = metrics.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics_input.message_received();
                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => router_input.handle(conn, client_msg).await,
                        Err(e) => {
                            // Malformed frames never reach the router.
                            debug!(conn_id = %conn, "Rejecting malformed frame: {}", e);
                            metrics_input.event_rejected();
                            let _ = tx.send(ServerMessage::Error {
                                message: format!("Malformed event: {e}"),
                            });
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(conn_id = %conn, "WebSocket error: {}", e);
                    metrics_input.websocket_error();
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!(conn_id = %conn, "Sender task ended"),
        _ = input_task => debug!(conn_id = %conn, "Input task ended"),
    }

    router.handle_disconnect(conn).await;
    metrics.connection_closed();
    info!(conn_id = %conn, "WebSocket disconnected");
}
