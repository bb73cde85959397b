use serde::{Deserialize, Serialize};

/// Response body for room creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedResponse {
    pub room_id: String,
}

/// Response body for listing active rooms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<String>,
}

/// Response body for a single room lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatusResponse {
    pub room_id: String,
    pub exists: bool,
    pub user_count: usize,
}
