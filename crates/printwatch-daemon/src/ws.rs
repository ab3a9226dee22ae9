//! WebSocket handler for real-time updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use printwatch_core::{ChangeKind, PrinterEvent, PrinterSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket message types
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    #[serde(rename = "printer_data_changed")]
    PrinterDataChanged(PrinterSnapshot),
    #[serde(rename = "printer_state_changed")]
    PrinterStateChanged(PrinterSnapshot),
    #[serde(rename = "pong")]
    Pong,
}

impl From<PrinterEvent> for WsMessage {
    fn from(event: PrinterEvent) -> Self {
        match event.kind {
            ChangeKind::DataChanged => Self::PrinterDataChanged(event.snapshot),
            ChangeKind::StateChanged => Self::PrinterStateChanged(event.snapshot),
        }
    }
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();

    info!("WebSocket client connected");

    // Send current snapshot on connect
    let msg = WsMessage::PrinterStateChanged(state.snapshot());
    if let Ok(json) = serde_json::to_string(&msg) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            // Forward printer events to client
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&WsMessage::from(event)) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Later events carry the full snapshot, so skipping is fine
                        debug!(skipped = n, "Printer event channel lagged");
                    }
                    Err(e) => {
                        debug!(error = %e, "Printer event channel closed");
                        break;
                    }
                }
            }

            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == "ping" {
                            if let Ok(pong) = serde_json::to_string(&WsMessage::Pong) {
                                if sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use printwatch_core::PrinterState;

    fn event(kind: ChangeKind, state: PrinterState) -> PrinterEvent {
        PrinterEvent {
            kind,
            snapshot: PrinterSnapshot {
                state,
                ..Default::default()
            },
            at: Default::default(),
        }
    }

    #[test]
    fn test_event_message_shape() {
        let msg = WsMessage::from(event(ChangeKind::StateChanged, PrinterState::Paused));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "printer_state_changed");
        assert_eq!(json["data"]["state"], "paused");

        let msg = WsMessage::from(event(ChangeKind::DataChanged, PrinterState::Idle));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "printer_data_changed");
    }

    #[test]
    fn test_pong_message() {
        assert_eq!(serde_json::to_string(&WsMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }
}
