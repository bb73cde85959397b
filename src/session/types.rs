use serde::{Deserialize, Serialize};

/// Request body for session creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub username: String,
}

/// Response body for session creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreatedResponse {
    pub session_id: String,
}

/// Response body describing the caller's session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfoResponse {
    pub session_id: String,
    pub username: String,
    pub joined_rooms: Vec<String>,
}
