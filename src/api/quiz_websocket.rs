use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::quiz::{ConnectionHub, ConnectionId, QuizCoordinator, QuizSignalingHandler};

pub async fn handle_quiz_websocket(
    websocket: WebSocket,
    coordinator: Arc<QuizCoordinator>,
    hub: Arc<ConnectionHub>,
) {
    let connection_id = ConnectionId::generate();
    tracing::info!(connection_id = %connection_id, "New quiz WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    hub.register(connection_id.clone(), tx).await;

    let signaling_handler = QuizSignalingHandler::new(coordinator, connection_id.clone());

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // One message at a time keeps a connection's events in arrival order.
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                if let Ok(text) = message.to_str() {
                    tracing::debug!(connection_id = %connection_id, "Received quiz message: {}", text);
                    signaling_handler.handle_text(text).await;
                }
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    signaling_handler.cleanup().await;
    hub.unregister(&connection_id).await;
    sender_task.abort();
    tracing::info!(connection_id = %connection_id, "Quiz WebSocket connection closed");
}
