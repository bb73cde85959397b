use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::models::{Message, MessageKind};

/// Inbound text that does not parse as a client payload
///
/// Callers log and drop these; a garbled frame never tears down the
/// connection.
#[derive(Debug, Error)]
#[error("malformed payload: {0}")]
pub struct MalformedPayload(#[from] serde_json::Error);

/// Kinds of payloads a client may send over an established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessageKind {
    Chat,
    Typing,
}

/// Structured payload received from a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: ClientMessageKind,
    pub message: Option<String>,
}

impl ClientMessage {
    /// Parses raw inbound text into a typed payload
    pub fn parse(raw: &str) -> Result<Self, MalformedPayload> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Outbound event broadcast to a room: `{type, user, message, timestamp?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub user: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireMessage {
    /// Wraps a persisted history entry for the wire
    pub fn from_message(message: &Message) -> Self {
        Self {
            kind: message.kind,
            user: message.user.clone(),
            message: message.message.clone(),
            timestamp: Some(message.timestamp),
        }
    }

    /// Synthesized announcement when a user joins a room
    pub fn user_joined(username: &str) -> Self {
        Self {
            kind: MessageKind::UserJoined,
            user: username.to_string(),
            message: format!("{} joined the room", username),
            timestamp: Some(Utc::now()),
        }
    }

    /// Synthesized announcement when a user leaves a room
    pub fn user_left(username: &str) -> Self {
        Self {
            kind: MessageKind::UserLeft,
            user: username.to_string(),
            message: format!("{} left the room", username),
            timestamp: Some(Utc::now()),
        }
    }

    /// Transient typing indicator; relayed, never persisted
    pub fn typing(username: &str) -> Self {
        Self {
            kind: MessageKind::Typing,
            user: username.to_string(),
            message: String::new(),
            timestamp: None,
        }
    }
}
