//! `WebSocket` endpoint for live leaderboard updates.
//!
//! Each connection registers as a hub subscriber and receives an initial
//! all-time leaderboard, then a `new-entry` message for every ledger
//! change. Clients may send:
//!
//! - `{"event": "request-leaderboard", "data": {"timeWindow": "1hour"}}`
//! - `{"event": "add-entry", "data": {"house": "Gryffindor", "points": 10, "reason": "..."}}`
//! - `{"event": "control-generator", "data": {"action": "start", "intervalMinutes": 2}}`
//!
//! Failures are answered with an `error` message on the same connection.
//! Generator control runs on its own task and answers through a
//! per-connection reply queue, so a long bulk run never holds up hub
//! traffic for that socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use housecup_core::{SubscriberId, Subscription};
use housecup_types::{NewEntry, Window};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::control::{self, ControlOutcome, ControlRequest};
use crate::state::AppState;

/// Pending direct replies per connection.
const REPLY_BUFFER: usize = 8;

/// Body of a `request-leaderboard` message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowRequest {
    #[serde(default)]
    time_window: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ClientMessage {
    RequestLeaderboard(WindowRequest),
    AddEntry(NewEntry),
    ControlGenerator(ControlRequest),
}

/// Direct answers to a client message. Broadcast traffic is sent as
/// [`housecup_core::HubMessage`].
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum Reply {
    GeneratorStatus(ControlOutcome),
    Error { message: String },
}

/// Upgrade to a `WebSocket` and attach the connection to the hub.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_leaderboard(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let Subscription { id, mut receiver } = state.hub.subscribe().await;
    let (reply_tx, mut reply_rx) = mpsc::channel::<Reply>(REPLY_BUFFER);
    info!(subscriber = %id, "WebSocket client connected");

    loop {
        tokio::select! {
            queued = receiver.recv() => {
                let Some(message) = queued else {
                    debug!(subscriber = %id, "Hub dropped subscriber");
                    break;
                };
                if send_json(&mut socket, &message).await.is_err() {
                    debug!(subscriber = %id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            Some(reply) = reply_rx.recv() => {
                if send_json(&mut socket, &reply).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply =
                            handle_client_message(&state, id, text.as_str(), &reply_tx).await;
                        let sent = match reply {
                            Some(reply) => send_json(&mut socket, &reply).await,
                            None => Ok(()),
                        };
                        if sent.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(subscriber = %id, "WebSocket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unsubscribe(id).await;
    info!(subscriber = %id, "WebSocket client disconnected");
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), axum::Error> {
    match serde_json::to_string(value) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to serialize outgoing message: {e}");
            Ok(())
        }
    }
}

/// Dispatch one client message. Returns an immediate reply for the sender,
/// if any.
///
/// Leaderboard answers and new-entry notices travel through the hub, so
/// successful `request-leaderboard` and `add-entry` messages produce no
/// direct reply. `control-generator` is handed to a spawned task whose
/// outcome arrives on `replies`.
async fn handle_client_message(
    state: &Arc<AppState>,
    id: SubscriberId,
    text: &str,
    replies: &mpsc::Sender<Reply>,
) -> Option<Reply> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            return Some(Reply::Error {
                message: format!("invalid message: {e}"),
            });
        }
    };

    match message {
        ClientMessage::RequestLeaderboard(request) => {
            let window = Window::from_token(request.time_window.as_deref());
            state.hub.request_window(id, window).await;
            None
        }
        ClientMessage::AddEntry(entry) => match state.record_entry(&entry).await {
            Ok(_) => None,
            Err(e) => Some(Reply::Error {
                message: e.to_string(),
            }),
        },
        ClientMessage::ControlGenerator(request) => {
            let state = Arc::clone(state);
            let replies = replies.clone();
            tokio::spawn(async move {
                let reply = match control::apply(&state, &request).await {
                    Ok(outcome) => Reply::GeneratorStatus(outcome),
                    Err(e) => Reply::Error {
                        message: e.to_string(),
                    },
                };
                if replies.send(reply).await.is_err() {
                    debug!(subscriber = %id, "Connection closed before generator reply");
                }
            });
            None
        }
    }
}
