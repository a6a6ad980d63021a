//! WebSocket handling.
//!
//! # Responsibilities
//! - Stream orchestration events to `/ws/heartbeat` clients
//! - Echo text frames for the monitor's `/ws` endpoint
//!
//! # Data Flow
//! ```text
//! EventBroadcaster ──mpsc──→ connection task ──text frame──→ Client
//! ```
//!
//! # Design Decisions
//! - Subscribe before the welcome frame so no event is missed after it
//! - The server only closes a stream during shutdown
//! - Ping/pong handled by axum

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;

use crate::events::EventBroadcaster;
use crate::lifecycle::ShutdownSignal;

/// Welcome frame sent on connect.
pub fn welcome_message() -> String {
    format!("Connected at {}", Utc::now().to_rfc3339())
}

/// Forward every published event to `socket` until either side goes away.
pub async fn stream_events(mut socket: WebSocket, broadcaster: Arc<EventBroadcaster>, mut shutdown: ShutdownSignal) {
    let mut subscriber = broadcaster.subscribe();
    let id = subscriber.id();
    tracing::info!(subscriber = %id, "Event stream client connected");

    if socket.send(Message::Text(welcome_message().into())).await.is_err() {
        broadcaster.unsubscribe(id);
        return;
    }

    loop {
        tokio::select! {
            event = subscriber.recv() => match event {
                Some(event) => {
                    if let Err(e) = socket.send(Message::Text(event.to_json().into())).await {
                        tracing::debug!(subscriber = %id, error = %e, "Event delivery failed");
                        break;
                    }
                }
                // Pruned by the broadcaster after a failed delivery
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = shutdown.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    broadcaster.unsubscribe(id);
    tracing::info!(subscriber = %id, "Event stream client disconnected");
}

/// Reply to each text frame with `Message received: <text>`.
pub async fn echo(mut socket: WebSocket, mut shutdown: ShutdownSignal) {
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let reply = format!("Message received: {}", text.as_str());
                    if socket.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = shutdown.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
