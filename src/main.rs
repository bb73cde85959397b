mod message;
mod room;
mod session;
mod shared;
mod websockets;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::{AppState, BrokerConfig};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Parlor chat broker");

    let config = BrokerConfig::default();
    let sweep_interval = config.session_sweep_interval;
    let app_state = AppState::new(config);

    // Background sweep of expired sessions; lazy expiry on read remains the
    // correctness guarantee
    tokio::spawn(session::sweeper::start_session_sweep_task(
        Arc::clone(&app_state.sessions),
        sweep_interval,
    ));

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route("/rooms", post(room::create_room).get(room::list_rooms))
        .route("/rooms/:room_id", get(room::get_room))
        .route("/sessions", post(session::create_session))
        .route(
            "/sessions/me",
            get(session::get_current_session).delete(session::delete_session),
        )
        .route("/ws/:room_id", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("Server running on http://localhost:3000");
    axum::serve(listener, app).await.unwrap();
}
