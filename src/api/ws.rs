//! Live notification channel.
//!
//! Route: GET /api/notifications/hub
//!
//! The handler:
//!   1. Authenticates the user (`?access_token=` or bearer header)
//!   2. Upgrades to WebSocket and registers the session with the hub
//!   3. Sends an `UnreadCountChanged` snapshot of the committed count
//!   4. Forwards hub events to the client as JSON text frames
//!   5. Relays `messageRead` commands to the user's other sessions
//!   6. Unregisters on close

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::auth::{bearer_token, decode_user_token};
use crate::notification::HubEvent;
use crate::AppState;

// ── Query params ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    pub access_token: Option<String>,
}

/// Frames a client may send on the live channel.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    MessageRead { chat_id: Uuid, message_id: Uuid },
}

// ── Handler ───────────────────────────────────────────────────

pub async fn hub_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HubQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = params
        .access_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or(AppError::Unauthorized)?;
    let user_id = decode_user_token(token, &state.config.jwt_secret)?;

    Ok(ws.on_upgrade(move |socket| async move {
        run_session(socket, user_id, state).await;
    }))
}

// ── Session loop ──────────────────────────────────────────────

async fn run_session(socket: WebSocket, user_id: Uuid, state: Arc<AppState>) {
    let mut sub = state.hub.subscribe(user_id);
    let connection_id = sub.connection_id;
    let (mut sink, mut stream) = socket.split();

    tracing::info!(user_id = %user_id, connection_id, "live channel: connected");

    match state.reconciler.counter().get_unread_count(user_id).await {
        Ok(unread_count) => {
            let snapshot = HubEvent::UnreadCountChanged {
                user_id,
                unread_count,
            };
            if send_event(&mut sink, &snapshot).await.is_err() {
                state.hub.unsubscribe(user_id, connection_id);
                return;
            }
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, "live channel: snapshot count failed: {:#}", e);
        }
    }

    loop {
        tokio::select! {
            event = sub.events.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut sink, &event).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_text(&state, user_id, connection_id, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, "live channel: read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    state.hub.unsubscribe(user_id, connection_id);
    tracing::info!(user_id = %user_id, connection_id, "live channel: disconnected");
}

async fn send_event<S>(sink: &mut S, event: &HubEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = serde_json::to_string(event).map_err(|e| {
        tracing::error!("live channel: failed to encode {}: {}", event.name(), e);
    })?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}

fn handle_client_text(state: &AppState, user_id: Uuid, connection_id: u64, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::MessageRead {
            chat_id,
            message_id,
        }) => {
            state.hub.deliver_except(
                user_id,
                connection_id,
                &HubEvent::MessageRead {
                    chat_id,
                    message_id,
                },
            );
        }
        Err(e) => {
            tracing::debug!(user_id = %user_id, "live channel: ignoring frame: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_read_command_parses() {
        let chat_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"messageRead","chatId":"{}","messageId":"{}"}}"#,
            chat_id, message_id
        );
        assert_eq!(
            serde_json::from_str::<ClientCommand>(&raw).unwrap(),
            ClientCommand::MessageRead {
                chat_id,
                message_id
            }
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"joinGroup"}"#).is_err());
    }
}
