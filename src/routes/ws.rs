//! WebSocket upgrade + lobby message loop.
//!
//! Each connection owns one outbound funnel (an mpsc drained by a writer
//! task) plus one forwarder task per channel subscription, so direct replies
//! and session/user broadcasts interleave on a single socket. Subscriptions
//! are tracked per connection so a rejoin never stacks a second forwarder.
//! Disconnect aborts the forwarders and performs no roster cleanup.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!(target: "quizhive_backend", "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Channel subscriptions held by one connection. A session or user id is
/// forwarded by at most one task; a second subscription to the same channel
/// would deliver every broadcast twice.
#[derive(Default)]
struct Subscriptions {
    tasks: Vec<JoinHandle<()>>,
    sessions: HashSet<String>,
    users: HashSet<String>,
}

/// Pipe one broadcast subscription into the connection's outbound funnel.
/// Lagged receivers skip ahead; a closed channel ends the task.
fn spawn_forwarder(
    mut rx: broadcast::Receiver<ServerWsMessage>,
    out_tx: mpsc::Sender<ServerWsMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "lobby", skipped, "slow consumer, dropping events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    info!(target: "quizhive_backend", "WebSocket connected");

    let (out_tx, mut out_rx) = mpsc::channel::<ServerWsMessage>(32);
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let out = serde_json::to_string(&msg).unwrap_or_else(|e| {
                serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
                    .to_string()
            });
            if let Err(e) = sink.send(Message::Text(out)).await {
                error!(target: "quizhive_backend", error = %e, "WS send error");
                break;
            }
        }
    });

    let mut subs = Subscriptions::default();

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(txt) => {
                let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
                    Ok(incoming) => {
                        debug!(target: "quizhive_backend", "WS received: {:?}", &incoming);
                        dispatch(incoming, &state, &out_tx, &mut subs).await
                    }
                    Err(e) => Some(ServerWsMessage::Error {
                        message: format!("Invalid JSON: {}", e),
                    }),
                };
                if let Some(reply) = reply {
                    if out_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            // Ping/Pong are handled by the protocol layer.
            _ => {}
        }
    }

    for task in subs.tasks {
        task.abort();
    }
    writer.abort();
    // No roster cleanup on disconnect; idle sessions are reclaimed by the reaper.
    info!(target: "quizhive_backend", "WebSocket disconnected");
}

/// Map one client message to lobby operations. Unknown references are logged
/// server-side and answered with a typed error event.
#[instrument(level = "debug", skip_all)]
async fn dispatch(
    msg: ClientWsMessage,
    state: &AppState,
    out_tx: &mpsc::Sender<ServerWsMessage>,
    subs: &mut Subscriptions,
) -> Option<ServerWsMessage> {
    match msg {
        ClientWsMessage::Ping => Some(ServerWsMessage::Pong),

        ClientWsMessage::RegisterUser { user_id } => {
            if subs.users.insert(user_id.clone()) {
                let rx = state.lobby.register_user(&user_id).await;
                subs.tasks.push(spawn_forwarder(rx, out_tx.clone()));
                info!(target: "lobby", %user_id, "user registered for invites");
            }
            None
        }

        ClientWsMessage::JoinSession { session_id, user } => {
            let (rx, participants, category) =
                state.lobby.join_session(&session_id, user).await;
            // A rejoin gets the snapshot again but keeps its one forwarder.
            if subs.sessions.insert(session_id.clone()) {
                subs.tasks.push(spawn_forwarder(rx, out_tx.clone()));
            }
            let _ = out_tx
                .send(ServerWsMessage::SessionSnapshot { participants })
                .await;
            // Late joiners catch up on the current category choice.
            if let Some(category) = category {
                let _ = out_tx.send(ServerWsMessage::SetCategory { category }).await;
            }
            None
        }

        ClientWsMessage::SendInvite {
            to_user_id,
            session,
        } => match state.lobby.send_invite(&to_user_id, session).await {
            Ok(()) => None,
            Err(e) => {
                warn!(target: "lobby", error = %e, "send_invite failed");
                Some(ServerWsMessage::Error {
                    message: e.to_string(),
                })
            }
        },

        ClientWsMessage::RemoveInvite {
            to_user_id,
            session,
        } => match state.lobby.remove_invite(&to_user_id, session).await {
            Ok(()) => None,
            Err(e) => {
                warn!(target: "lobby", error = %e, "remove_invite failed");
                Some(ServerWsMessage::Error {
                    message: e.to_string(),
                })
            }
        },

        ClientWsMessage::ModeCategory {
            session_id,
            category,
        } => match state.lobby.set_category(&session_id, category).await {
            Ok(()) => None,
            Err(e) => {
                warn!(target: "lobby", error = %e, "mode_category failed");
                Some(ServerWsMessage::Error {
                    message: e.to_string(),
                })
            }
        },

        ClientWsMessage::InviteResponse {
            session_id,
            user,
            status,
        } => match state.lobby.invite_response(&session_id, user, status).await {
            Ok(()) => None,
            Err(e) => {
                warn!(target: "lobby", error = %e, "invite_response failed");
                Some(ServerWsMessage::Error {
                    message: e.to_string(),
                })
            }
        },
    }
}
