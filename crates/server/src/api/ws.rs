//! WebSocket support for live item updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use qform_core::{Artifact, ItemEvent, ItemId, ItemStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A file was uploaded and registered.
    ItemAdded {
        item_id: ItemId,
        display_name: String,
    },
    /// An item changed status.
    ItemStatus { item_id: ItemId, status: ItemStatus },
    /// An item's artifact links changed.
    ItemArtifacts {
        item_id: ItemId,
        artifacts: Vec<Artifact>,
    },
    /// An item was removed.
    ItemRemoved { item_id: ItemId },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn type_name(&self) -> &'static str {
        match self {
            WsMessage::ItemAdded { .. } => "item_added",
            WsMessage::ItemStatus { .. } => "item_status",
            WsMessage::ItemArtifacts { .. } => "item_artifacts",
            WsMessage::ItemRemoved { .. } => "item_removed",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<ItemEvent> for WsMessage {
    fn from(event: ItemEvent) -> Self {
        match event {
            ItemEvent::Registered {
                item_id,
                display_name,
            } => WsMessage::ItemAdded {
                item_id,
                display_name,
            },
            ItemEvent::StatusChanged { item_id, status } => {
                WsMessage::ItemStatus { item_id, status }
            }
            ItemEvent::ArtifactsChanged { item_id, artifacts } => {
                WsMessage::ItemArtifacts { item_id, artifacts }
            }
            ItemEvent::Removed { item_id } => WsMessage::ItemRemoved { item_id },
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before anything else so no event is missed
    let mut rx = state.registry().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            let msg = tokio::select! {
                result = rx.recv() => match result {
                    Ok(event) => WsMessage::from(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Item event channel closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                },
            };

            WS_MESSAGES_SENT.with_label_values(&[msg.type_name()]).inc();

            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize WsMessage: {}", e);
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_serialization() {
        let msg = WsMessage::from(ItemEvent::StatusChanged {
            item_id: "f1".into(),
            status: ItemStatus::Processing,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "item_status");
        assert_eq!(json["item_id"], "f1");
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn test_artifacts_event_serialization() {
        let msg = WsMessage::from(ItemEvent::ArtifactsChanged {
            item_id: "f1".into(),
            artifacts: vec![Artifact {
                ordinal: 0,
                href: "flowchart/f1_0".to_string(),
                source: None,
            }],
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "item_artifacts");
        assert_eq!(json["artifacts"][0]["href"], "flowchart/f1_0");
    }

    #[test]
    fn test_heartbeat_type_name() {
        let msg = WsMessage::Heartbeat { timestamp: 0 };
        assert_eq!(msg.type_name(), "heartbeat");
    }
}
