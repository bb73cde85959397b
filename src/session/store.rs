use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::models::SessionModel;
use crate::shared::AppError;

/// Both maps move together, so they live under one lock
struct StoreInner {
    sessions: HashMap<String, SessionModel>,
    username_to_session: HashMap<String, String>,
}

/// In-memory session store with sliding TTL and lazy expiry
///
/// Expired sessions are removed the moment a read touches them; the
/// periodic sweep is a cleanup optimization, never a correctness
/// requirement.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                sessions: HashMap::new(),
                username_to_session: HashMap::new(),
            }),
            ttl,
        }
    }

    /// Creates a session for a username, replacing any prior live session
    ///
    /// The previous session id for this username becomes permanently
    /// invalid even if its TTL had not elapsed.
    #[instrument(skip(self))]
    pub async fn create(&self, username: &str) -> Result<String, AppError> {
        let username = username.trim();
        if username.chars().count() < 2 {
            return Err(AppError::Validation(
                "Username must be at least 2 characters".to_string(),
            ));
        }
        if username.chars().count() > 50 {
            return Err(AppError::Validation(
                "Username too long (max 50 characters)".to_string(),
            ));
        }

        let mut inner = self.inner.lock().unwrap();

        if let Some(old_id) = inner.username_to_session.get(username).cloned() {
            let was_live = inner
                .sessions
                .get(&old_id)
                .map(|s| !s.is_expired(self.ttl))
                .unwrap_or(false);
            Self::remove_locked(&mut inner, &old_id);
            if was_live {
                info!(username = %username, "Replaced prior live session");
            } else {
                debug!(username = %username, "Discarded stale session for username");
            }
        }

        let session = SessionModel::new(username.to_string());
        let session_id = session.id.clone();
        inner
            .username_to_session
            .insert(username.to_string(), session_id.clone());
        inner.sessions.insert(session_id.clone(), session);

        info!(username = %username, session_id = %session_id, "Session created");
        Ok(session_id)
    }

    /// Looks up a session, refreshing its sliding window on a valid hit
    ///
    /// Unknown and stale ids both come back as `None`; stale entries are
    /// removed on the spot.
    #[instrument(skip(self))]
    pub async fn get(&self, session_id: &str) -> Option<SessionModel> {
        let mut inner = self.inner.lock().unwrap();

        let expired = match inner.sessions.get(session_id) {
            Some(session) => session.is_expired(self.ttl),
            None => return None,
        };

        if expired {
            debug!(session_id = %session_id, "Session expired, removing lazily");
            Self::remove_locked(&mut inner, session_id);
            return None;
        }

        let session = inner.sessions.get_mut(session_id).unwrap();
        session.touch();
        Some(session.clone())
    }

    /// Records a joined room on a session; no-op for invalid sessions
    #[instrument(skip(self))]
    pub async fn add_room(&self, session_id: &str, room_id: &str) {
        self.with_valid_session(session_id, |session| session.add_room(room_id));
    }

    /// Removes a joined room from a session; no-op for invalid sessions
    #[instrument(skip(self))]
    pub async fn remove_room(&self, session_id: &str, room_id: &str) {
        self.with_valid_session(session_id, |session| session.remove_room(room_id));
    }

    /// Explicit logout; idempotent
    #[instrument(skip(self))]
    pub async fn remove(&self, session_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        Self::remove_locked(&mut inner, session_id);
    }

    /// Removes every expired session; returns how many were dropped
    ///
    /// Purely an optimization over lazy expiry on `get`.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap();

        let expired: Vec<String> = inner
            .sessions
            .values()
            .filter(|s| s.is_expired(self.ttl))
            .map(|s| s.id.clone())
            .collect();

        for session_id in &expired {
            Self::remove_locked(&mut inner, session_id);
        }

        debug!(removed = expired.len(), "Expired sessions swept");
        expired.len() as u64
    }

    /// Current number of stored sessions, stale entries included
    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    fn with_valid_session<F: FnOnce(&mut SessionModel)>(&self, session_id: &str, f: F) {
        let mut inner = self.inner.lock().unwrap();
        let expired = match inner.sessions.get(session_id) {
            Some(session) if !session.is_expired(self.ttl) => false,
            Some(_) => true,
            None => return,
        };
        if expired {
            Self::remove_locked(&mut inner, session_id);
            return;
        }
        let session = inner.sessions.get_mut(session_id).unwrap();
        session.touch();
        f(session);
    }

    fn remove_locked(inner: &mut StoreInner, session_id: &str) {
        if let Some(session) = inner.sessions.remove(session_id) {
            // Only drop the username mapping if it still points at us; a
            // replacement session may own the name by now
            if inner.username_to_session.get(&session.username) == Some(&session.id) {
                inner.username_to_session.remove(&session.username);
            }
        }
    }
}
