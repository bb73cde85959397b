use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::types::{RoomCreatedResponse, RoomListResponse, RoomStatusResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /rooms
/// Returns the generated room id
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RoomCreatedResponse>), AppError> {
    let room_id = state.rooms.create_room().await;

    info!(room_id = %room_id, "Room created successfully");

    Ok((StatusCode::CREATED, Json(RoomCreatedResponse { room_id })))
}

/// HTTP handler for listing all active rooms
///
/// GET /rooms
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<RoomListResponse>, AppError> {
    let rooms = state.rooms.list().await;

    info!(room_count = rooms.len(), "Rooms listed successfully");

    Ok(Json(RoomListResponse { rooms }))
}

/// HTTP handler for checking a single room
///
/// GET /rooms/{room_id}
/// 404 if the room does not exist
#[instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStatusResponse>, AppError> {
    if !state.rooms.exists(&room_id).await {
        return Err(AppError::NotFound("Room not found".to_string()));
    }

    let user_count = state.hub.room_user_count(&room_id).await;

    Ok(Json(RoomStatusResponse {
        room_id,
        exists: true,
        user_count,
    }))
}
