//! WebSocket subscriber endpoint
//!
//! Each connection registers with the observer hub and receives the event
//! envelope stream: `config` then `stats` on connect, `config_updated` and
//! `request_log` live. `get_config` / `get_stats` client messages elicit
//! snapshot replies; other readable messages are ignored; unreadable
//! frames close the connection.

use crate::observer::Event;
use crate::server::app::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (id, tx, mut rx) = state.observers.subscribe();
    debug!(subscriber = %id, "websocket subscriber connected");

    send_config_snapshot(&state, &tx).await;
    send_stats_snapshot(&state, &tx).await;

    // Writer: drains the subscriber queue until the hub cancels it or the
    // peer goes away.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode event: {}", e);
                    continue;
                },
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => match message.kind.as_str() {
                    "get_config" => send_config_snapshot(&state, &tx).await,
                    "get_stats" => send_stats_snapshot(&state, &tx).await,
                    _ => {},
                },
                Err(_) => break,
            },
            Ok(Message::Binary(_)) => break,
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(_) => break,
        }
    }

    state.observers.unsubscribe(id);
    send_task.abort();
    debug!(subscriber = %id, "websocket subscriber disconnected");
}

async fn send_config_snapshot(state: &AppState, tx: &mpsc::Sender<Event>) {
    let Ok(config) = state.store.snapshot().await else {
        return;
    };
    if let Ok(data) = serde_json::to_value(&config) {
        let _ = tx.send(Event::config_snapshot(data)).await;
    }
}

async fn send_stats_snapshot(state: &AppState, tx: &mpsc::Sender<Event>) {
    if let Ok(data) = serde_json::to_value(state.stats.snapshot()) {
        let _ = tx.send(Event::stats_snapshot(data)).await;
    }
}
