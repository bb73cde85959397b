use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument};

use super::store::SessionStore;

/// Starts the background task that periodically removes expired sessions
///
/// Lazy expiry on read is the correctness guarantee; this sweep only keeps
/// the map from accumulating entries nobody will read again.
#[instrument(skip(sessions))]
pub async fn start_session_sweep_task(sessions: Arc<SessionStore>, sweep_interval: Duration) {
    info!(
        sweep_interval_secs = sweep_interval.as_secs(),
        "Starting session sweep background task"
    );

    let mut sweep_interval = interval(sweep_interval);

    loop {
        sweep_interval.tick().await;

        let removed = sessions.sweep_expired().await;
        info!(
            removed_sessions = removed,
            remaining_sessions = sessions.session_count(),
            "Session sweep completed"
        );
    }
}
