use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A server-held user identity with sliding expiry
///
/// Validity is judged against `last_activity`, which every successful
/// lookup refreshes; there is at most one live session per username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    pub username: String,
    pub joined_rooms: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionModel {
    /// Creates a new session with a generated id
    pub fn new(username: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            joined_rooms: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Whether the sliding window has elapsed without activity
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Utc::now().signed_duration_since(self.last_activity) >= ttl
    }

    /// Refreshes the activity timestamp, extending the sliding window
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Adds a room to the joined set; keeps insertion order, no duplicates
    pub fn add_room(&mut self, room_id: &str) {
        if !self.joined_rooms.iter().any(|r| r == room_id) {
            self.joined_rooms.push(room_id.to_string());
        }
    }

    /// Removes a room from the joined set; no-op if absent
    pub fn remove_room(&mut self, room_id: &str) {
        self.joined_rooms.retain(|r| r != room_id);
    }
}
