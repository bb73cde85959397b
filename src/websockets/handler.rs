use async_trait::async_trait;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::hub::RoomConnection;
use super::messages::{ClientMessage, ClientMessageKind, WireMessage};
use super::socket::{Connection, MessageHandler};
use crate::message::models::MessageKind;
use crate::shared::AppState;

/// Routes inbound frames from one connection into the broker core
///
/// Chat messages are persisted and fanned out to the whole room; typing
/// indicators are relayed to everyone but the sender and never stored.
/// Text that fails to parse is logged and dropped, the connection stays
/// open.
pub struct ChatMessageHandler {
    state: AppState,
}

impl ChatMessageHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl MessageHandler for ChatMessageHandler {
    async fn handle_message(&self, username: &str, room_id: &str, connection_id: &str, raw: String) {
        let payload = match ClientMessage::parse(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    username = %username,
                    room_id = %room_id,
                    error = %e,
                    "Dropping malformed inbound payload"
                );
                return;
            }
        };

        match payload.kind {
            ClientMessageKind::Chat => {
                let Some(text) = payload.message else {
                    warn!(
                        username = %username,
                        room_id = %room_id,
                        "Dropping chat payload without message text"
                    );
                    return;
                };

                let stored = self
                    .state
                    .messages
                    .append(room_id, MessageKind::Chat, username, &text)
                    .await;
                if let Err(e) = self.state.rooms.record_activity(room_id).await {
                    debug!(room_id = %room_id, error = %e, "Chat in unregistered room");
                }
                self.state
                    .hub
                    .broadcast(room_id, &WireMessage::from_message(&stored))
                    .await;
            }
            ClientMessageKind::Typing => {
                self.state
                    .hub
                    .broadcast_except(room_id, &WireMessage::typing(username), connection_id)
                    .await;
            }
        }
    }
}

/// WebSocket endpoint for joining a room
///
/// GET /ws/{room_id} with the opaque session id in the
/// Sec-WebSocket-Protocol header. Validation happens on the upgraded
/// stream: an invalid session or unknown room closes it with a policy
/// close code before any membership registration.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let session_id = headers
        .get("sec-websocket-protocol")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_string());

    info!(room_id = %room_id, "WebSocket connection requested");

    ws.on_upgrade(move |socket| handle_websocket_connection(socket, room_id, session_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    mut socket: WebSocket,
    room_id: String,
    session_id: Option<String>,
    state: AppState,
) {
    // Resolve the session before touching any membership state
    let session = match &session_id {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    let Some(session) = session else {
        warn!(room_id = %room_id, "Join rejected: invalid or missing session");
        close_with_policy_violation(&mut socket, "invalid session").await;
        return;
    };

    if !state.rooms.exists(&room_id).await {
        warn!(room_id = %room_id, username = %session.username, "Join rejected: room not found");
        close_with_policy_violation(&mut socket, "room not found").await;
        return;
    }

    let username = session.username.clone();
    info!(
        room_id = %room_id,
        username = %username,
        "WebSocket connection established"
    );

    // Create the outbound channel (app -> client) and register with the hub;
    // registration cancels any pending eviction for the room
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    let connection = RoomConnection::new(username.clone(), outbound_sender.clone());
    let connection_id = connection.id.clone();

    state.hub.connect(&room_id, connection).await;
    state.sessions.add_room(&session.id, &room_id).await;

    // Replay recent history to the newcomer before any live traffic
    let history = state
        .messages
        .recent(&room_id, state.config.history_replay_limit)
        .await;
    for message in &history {
        if let Ok(text) = serde_json::to_string(&WireMessage::from_message(message)) {
            let _ = outbound_sender.send(text);
        }
    }
    debug!(
        room_id = %room_id,
        username = %username,
        replayed = history.len(),
        "Sent recent history to newly connected user"
    );

    // Announce the join to the whole room, newcomer included
    let announcement = WireMessage::user_joined(&username);
    let stored = state
        .messages
        .append(&room_id, MessageKind::UserJoined, &username, &announcement.message)
        .await;
    state
        .hub
        .broadcast(&room_id, &WireMessage::from_message(&stored))
        .await;

    let message_handler = Arc::new(ChatMessageHandler::new(state.clone()));

    let connection = Connection::new(
        connection_id.clone(),
        username.clone(),
        room_id.clone(),
        Box::new(socket),
        outbound_receiver,
        message_handler,
    );

    // Run the connection until disconnect
    match connection.run().await {
        Ok(()) => {
            info!(
                room_id = %room_id,
                username = %username,
                "WebSocket connection closed cleanly"
            );
        }
        Err(e) => {
            warn!(
                room_id = %room_id,
                username = %username,
                error = ?e,
                "WebSocket connection error"
            );
        }
    }

    // Cleanup: deregister first so a now-empty room starts its grace timer
    let became_empty = state.hub.disconnect(&room_id, &connection_id).await;
    state.sessions.remove_room(&session.id, &room_id).await;

    // The departure is recorded even when the room just emptied; history
    // survives until the room itself is evicted
    let farewell = WireMessage::user_left(&username);
    let stored = state
        .messages
        .append(&room_id, MessageKind::UserLeft, &username, &farewell.message)
        .await;
    state
        .hub
        .broadcast(&room_id, &WireMessage::from_message(&stored))
        .await;

    info!(
        room_id = %room_id,
        username = %username,
        room_empty = became_empty,
        "WebSocket disconnect handled"
    );
}

async fn close_with_policy_violation(socket: &mut WebSocket, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Cow::from(reason),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::BrokerConfig;

    async fn join(
        state: &AppState,
        room_id: &str,
        username: &str,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = RoomConnection::new(username.to_string(), sender);
        let connection_id = connection.id.clone();
        state.hub.connect(room_id, connection).await;
        (connection_id, receiver)
    }

    #[tokio::test]
    async fn test_chat_message_is_persisted_and_broadcast() {
        let state = AppState::new(BrokerConfig::default());
        let room_id = state.rooms.create_room().await;

        let (alice_id, mut rx_a) = join(&state, &room_id, "alice").await;
        let (_bob_id, mut rx_b) = join(&state, &room_id, "bob").await;

        let handler = ChatMessageHandler::new(state.clone());
        handler
            .handle_message(
                "alice",
                &room_id,
                &alice_id,
                r#"{"type": "chat", "message": "hello"}"#.to_string(),
            )
            .await;

        // Ordinary chat reaches everyone, the sender included
        let to_alice = rx_a.recv().await.unwrap();
        let to_bob = rx_b.recv().await.unwrap();
        assert_eq!(to_alice, to_bob);
        assert!(to_alice.contains(r#""type":"chat""#));
        assert!(to_alice.contains("hello"));

        assert_eq!(state.messages.count(&room_id).await, 1);
    }

    #[tokio::test]
    async fn test_typing_relay_excludes_sender_and_is_not_persisted() {
        let state = AppState::new(BrokerConfig::default());
        let room_id = state.rooms.create_room().await;

        let (alice_id, mut rx_a) = join(&state, &room_id, "alice").await;
        let (_bob_id, mut rx_b) = join(&state, &room_id, "bob").await;

        let handler = ChatMessageHandler::new(state.clone());
        handler
            .handle_message(
                "alice",
                &room_id,
                &alice_id,
                r#"{"type": "typing"}"#.to_string(),
            )
            .await;

        assert!(rx_b.recv().await.unwrap().contains(r#""type":"typing""#));
        assert!(rx_a.try_recv().is_err());
        assert_eq!(state.messages.count(&room_id).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let state = AppState::new(BrokerConfig::default());
        let room_id = state.rooms.create_room().await;

        let (alice_id, mut rx_a) = join(&state, &room_id, "alice").await;

        let handler = ChatMessageHandler::new(state.clone());
        handler
            .handle_message("alice", &room_id, &alice_id, "{{not json".to_string())
            .await;
        handler
            .handle_message(
                "alice",
                &room_id,
                &alice_id,
                r#"{"type": "chat"}"#.to_string(), // missing message text
            )
            .await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(state.messages.count(&room_id).await, 0);
    }

    #[tokio::test]
    async fn test_chat_refreshes_room_activity() {
        let state = AppState::new(BrokerConfig::default());
        let room_id = state.rooms.create_room().await;
        let (alice_id, _rx) = join(&state, &room_id, "alice").await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let handler = ChatMessageHandler::new(state.clone());
        handler
            .handle_message(
                "alice",
                &room_id,
                &alice_id,
                r#"{"type": "chat", "message": "ping"}"#.to_string(),
            )
            .await;

        let room = state.rooms.get(&room_id).await.unwrap();
        assert!(room.last_activity > room.created_at);
        assert_eq!(state.messages.count(&room_id).await, 1);
    }
}
