use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of chat events flowing through a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    UserJoined,
    UserLeft,
    Typing,
    System,
}

impl MessageKind {
    /// Typing indicators are transient relay-only events; everything else
    /// lands in the room history.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, MessageKind::Typing)
    }
}

/// One entry in a room's message history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub user: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub room_id: String,
}

impl Message {
    /// Creates a new message with generated id and current timestamp
    pub fn new(room_id: String, kind: MessageKind, user: String, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            user,
            message,
            timestamp: Utc::now(),
            room_id,
        }
    }
}
