use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::message::log::MessageLog;
use crate::room::registry::RoomRegistry;
use crate::session::store::SessionStore;
use crate::websockets::hub::ConnectionHub;

/// Tunable limits and lifetimes for the broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Grace period an empty room stays alive before eviction
    pub room_grace_ttl: Duration,
    /// Sliding inactivity window after which a session expires
    pub session_ttl: Duration,
    /// How often the background sweep removes expired sessions
    pub session_sweep_interval: Duration,
    /// Maximum retained messages per room (oldest dropped first)
    pub max_messages_per_room: usize,
    /// How many recent messages are replayed to a joining connection
    pub history_replay_limit: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            room_grace_ttl: Duration::from_secs(60),
            session_ttl: Duration::from_secs(24 * 60 * 60), // 24 hours
            session_sweep_interval: Duration::from_secs(30 * 60), // 30 minutes
            max_messages_per_room: 1000,
            history_replay_limit: 50,
        }
    }
}

/// Shared application state containing all broker components
///
/// Constructed once at startup and passed to every handler via axum `State`.
/// Tests build isolated instances with their own config instead of relying
/// on process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: BrokerConfig,
    pub sessions: Arc<SessionStore>,
    pub rooms: Arc<RoomRegistry>,
    pub messages: Arc<MessageLog>,
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(config: BrokerConfig) -> Self {
        let messages = Arc::new(MessageLog::new(config.max_messages_per_room));
        let sessions = Arc::new(SessionStore::new(config.session_ttl));
        let rooms = Arc::new(RoomRegistry::new(Arc::clone(&messages)));
        let hub = Arc::new(ConnectionHub::new(
            Arc::clone(&rooms),
            config.room_grace_ttl,
        ));

        Self {
            config,
            sessions,
            rooms,
            messages,
            hub,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
