//! WebSocket ingress
//!
//! Each text frame is one activity, and a connection carries a single
//! conversation: the first activity binds it. Turns run in arrival order on the
//! reading side; replies, including ones a skill sends later, go through the
//! connection's [`WebSocketSink`] to a dedicated writer task.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use sdk::activity::Activity;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::connections::ConnectionContext;
use super::ServerState;
use crate::adapter::{ReplySink, WebSocketSink};

/// Outbound queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

pub(super) async fn handle_websocket(socket: WebSocket, state: ServerState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Activity>(OUTBOUND_BUFFER);
    let mut connection = ConnectionContext::new(WebSocketSink::new(tx));

    info!("WebSocket connection {} established", connection.id);

    let writer = tokio::spawn(async move {
        while let Some(activity) = rx.recv().await {
            let frame = match serde_json::to_string(&activity) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to serialize outgoing activity: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        sender.close().await.ok();
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let activity = match serde_json::from_str::<Activity>(&text) {
                    Ok(activity) => activity,
                    Err(e) => {
                        warn!("Discarding malformed activity frame: {}", e);
                        send_error(&connection, format!("malformed activity: {}", e)).await;
                        continue;
                    }
                };

                if let Some(conversation_id) = activity.conversation_id() {
                    if let Err(e) = state.connections.register(&mut connection, conversation_id) {
                        warn!("Rejected activity on connection {}: {}", connection.id, e);
                        send_error(&connection, e.to_string()).await;
                        continue;
                    }
                }

                let sink: Arc<dyn ReplySink> = Arc::new(connection.sink.clone());
                match state.adapter.process_activity(activity, sink).await {
                    Ok(outcome) => debug!("WebSocket turn finished: {:?}", outcome),
                    Err(e) => send_error(&connection, e.to_string()).await,
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket connection {} closed by client", connection.id);
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    state.connections.unregister(&connection);
    drop(connection);
    writer.await.ok();

    info!("WebSocket connection closed");
}

/// Report a rejected frame as a trace activity on the socket
async fn send_error(connection: &ConnectionContext, reason: String) {
    let mut trace = Activity::trace(
        "Error",
        json!({"error": reason}),
        sdk::activity::ERROR_TRACE_VALUE_TYPE,
        "InvalidActivity",
    );
    trace.id = Some(uuid::Uuid::new_v4().to_string());
    if connection.sink.send(trace).await.is_err() {
        debug!("Connection {} gone before error could be reported", connection.id);
    }
}
