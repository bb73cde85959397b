use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live chat room
///
/// Membership is not stored here; it is derived from the connection hub.
/// A room exists exactly as long as the registry holds its entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomModel {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl RoomModel {
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_activity: now,
        }
    }

    /// Refreshes the last-activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
