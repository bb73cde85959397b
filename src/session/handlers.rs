use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::types::{CreateSessionRequest, SessionCreatedResponse, SessionInfoResponse};
use crate::shared::{AppError, AppState};

/// Pulls the opaque session id out of an `Authorization: Bearer` header
fn bearer_session_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.to_string())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
}

/// HTTP handler for creating a new session
///
/// POST /sessions
/// Validates the username and returns the opaque session id
#[instrument(name = "create_session", skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionCreatedResponse>), AppError> {
    let session_id = state.sessions.create(&request.username).await?;

    info!("Session created successfully");

    Ok((
        StatusCode::CREATED,
        Json(SessionCreatedResponse { session_id }),
    ))
}

/// HTTP handler for inspecting the caller's session
///
/// GET /sessions/me with `Authorization: Bearer <session_id>`
#[instrument(name = "get_current_session", skip(state, headers))]
pub async fn get_current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionInfoResponse>, AppError> {
    let session_id = bearer_session_id(&headers)?;

    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    Ok(Json(SessionInfoResponse {
        session_id: session.id,
        username: session.username,
        joined_rooms: session.joined_rooms,
    }))
}

/// HTTP handler for ending the caller's session
///
/// DELETE /sessions/me with `Authorization: Bearer <session_id>`
#[instrument(name = "delete_session", skip(state, headers))]
pub async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let session_id = bearer_session_id(&headers)?;

    state.sessions.remove(&session_id).await;

    info!("Session ended");
    Ok(Json(json!({ "message": "Session ended" })))
}
