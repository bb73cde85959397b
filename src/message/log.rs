use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, instrument};

use super::models::{Message, MessageKind};

/// In-memory, size-bounded per-room message history
///
/// Each room keeps at most `max_per_room` messages; appending beyond the
/// bound drops the oldest entries so the retained window always holds the
/// most recent messages in temporal order.
pub struct MessageLog {
    rooms: Mutex<HashMap<String, VecDeque<Message>>>,
    max_per_room: usize,
}

impl MessageLog {
    pub fn new(max_per_room: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            max_per_room,
        }
    }

    /// Appends a message to a room's history, trimming from the front if
    /// the room is over its bound. Returns the stored message.
    #[instrument(skip(self, content))]
    pub async fn append(
        &self,
        room_id: &str,
        kind: MessageKind,
        user: &str,
        content: &str,
    ) -> Message {
        let message = Message::new(
            room_id.to_string(),
            kind,
            user.to_string(),
            content.to_string(),
        );

        let mut rooms = self.rooms.lock().unwrap();
        let history = rooms.entry(room_id.to_string()).or_default();
        history.push_back(message.clone());
        while history.len() > self.max_per_room {
            history.pop_front();
        }

        debug!(
            room_id = %room_id,
            message_id = %message.id,
            stored = history.len(),
            "Message appended to room history"
        );
        message
    }

    /// Returns the most recent `min(limit, stored)` messages, oldest first
    #[instrument(skip(self))]
    pub async fn recent(&self, room_id: &str, limit: usize) -> Vec<Message> {
        let rooms = self.rooms.lock().unwrap();
        match rooms.get(room_id) {
            Some(history) => {
                let skip = history.len().saturating_sub(limit);
                history.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Discards the entire history for a room (called on room eviction)
    #[instrument(skip(self))]
    pub async fn clear(&self, room_id: &str) {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.remove(room_id).is_some() {
            debug!(room_id = %room_id, "Room history cleared");
        }
    }

    /// Number of messages currently stored for a room
    pub async fn count(&self, room_id: &str) -> usize {
        let rooms = self.rooms.lock().unwrap();
        rooms.get(room_id).map_or(0, |h| h.len())
    }
}
