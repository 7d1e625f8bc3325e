//! Websocket connection handling.
//!
//! The session middleware runs before the upgrade, so an unauthenticated
//! client is rejected with 401 and never reaches this module. After the
//! upgrade, one task per connection multiplexes client frames, agent replies,
//! and registry control messages. A connection serves one request at a time;
//! further requests while one is in flight get a typed error frame.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::models::AuthUser;
use crate::server::AppState;
use crate::ws::protocol::{ClientFrame, ServerFrame};
use crate::ws::registry::ConnectionControl;

const BUSY_ERROR: &str = "A request is already being processed";
const MALFORMED_ERROR: &str = "Failed to process message";

/// Upgrade handler for `/ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, auth: AuthUser) {
    // The token was valid, but the account must still exist.
    match state.storage.get_user(auth.id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let frame = ServerFrame::error("Authentication failed - invalid user");
            let _ = socket.send(Message::Text(frame.to_json().into())).await;
            let _ = socket.close().await;
            return;
        }
        Err(e) => {
            tracing::error!("user lookup failed during websocket auth: {}", e);
            let frame = ServerFrame::error("Authentication failed");
            let _ = socket.send(Message::Text(frame.to_json().into())).await;
            let _ = socket.close().await;
            return;
        }
    }

    let user_id = auth.id;
    let (handle, mut control_rx) = state.registry.register(user_id);
    let conn_id = handle.conn_id;
    tracing::info!("websocket connected for user {} ({})", user_id, conn_id);

    let (mut sender, mut receiver) = socket.split();

    let hello = ServerFrame::success("Authentication successful");
    if sender.send(Message::Text(hello.to_json().into())).await.is_err() {
        state.registry.deregister(user_id, conn_id);
        return;
    }

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerFrame>();
    let mut busy = false;

    loop {
        tokio::select! {
            message = receiver.next() => {
                let Some(message) = message else { break };
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!("websocket receive error for user {}: {}", user_id, e);
                        break;
                    }
                };
                let parsed = match message {
                    Message::Text(text) => serde_json::from_str::<ClientFrame>(&text),
                    Message::Binary(bytes) => serde_json::from_slice::<ClientFrame>(&bytes),
                    Message::Pong(_) => {
                        state.registry.mark_alive(user_id, conn_id);
                        continue;
                    }
                    // Axum answers inbound pings itself.
                    Message::Ping(_) => continue,
                    Message::Close(_) => break,
                };
                match parsed {
                    Ok(ClientFrame::Request { content }) => {
                        if busy {
                            let frame = ServerFrame::error(BUSY_ERROR);
                            if sender.send(Message::Text(frame.to_json().into())).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        busy = true;
                        let agent = state.agent.clone();
                        let reply_tx = reply_tx.clone();
                        tokio::spawn(async move {
                            let reply = agent.process_message(&content, Some(user_id)).await;
                            let _ = reply_tx.send(ServerFrame::Response(reply));
                        });
                    }
                    Ok(ClientFrame::Other) => {
                        tracing::debug!("ignoring unknown frame type from user {}", user_id);
                    }
                    Err(e) => {
                        // Malformed frames get one error frame; the
                        // connection stays open.
                        tracing::debug!("malformed frame from user {}: {}", user_id, e);
                        let frame = ServerFrame::error(MALFORMED_ERROR);
                        if sender.send(Message::Text(frame.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            reply = reply_rx.recv() => {
                // reply_tx lives in this scope, so the channel cannot close
                // while the loop runs.
                let Some(frame) = reply else { break };
                busy = false;
                if sender.send(Message::Text(frame.to_json().into())).await.is_err() {
                    break;
                }
            }
            control = control_rx.recv() => {
                match control {
                    Some(ConnectionControl::Ping) => {
                        if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                    Some(ConnectionControl::Shutdown) | None => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    state.registry.deregister(user_id, conn_id);
    tracing::info!("websocket disconnected for user {} ({})", user_id, conn_id);
}
