use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::models::RoomModel;
use crate::message::log::MessageLog;
use crate::shared::AppError;

/// Length of generated room ids (hex prefix of a v4 UUID)
const ROOM_ID_LEN: usize = 10;

/// Source of current room membership counts, consulted when an eviction
/// timer fires. Implemented by the connection hub.
#[async_trait]
pub trait RoomOccupancy: Send + Sync {
    async fn user_count(&self, room_id: &str) -> usize;
}

/// Tracks which rooms exist and runs deferred eviction of empty ones
///
/// An empty room is not removed immediately: the hub schedules a grace
/// timer, and any new connection cancels it. When a timer fires it
/// re-checks existence and occupancy against current state before removal,
/// because membership can change during the whole grace window.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomModel>>,
    eviction_timers: Mutex<HashMap<String, JoinHandle<()>>>,
    message_log: Arc<MessageLog>,
}

impl RoomRegistry {
    pub fn new(message_log: Arc<MessageLog>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            eviction_timers: Mutex::new(HashMap::new()),
            message_log,
        }
    }

    /// Creates a new room and returns its generated id
    ///
    /// The short id is retried until unique among currently active rooms;
    /// a truncated UUID alone is not collision-free at scale.
    #[instrument(skip(self))]
    pub async fn create_room(&self) -> String {
        let room_id = {
            let mut rooms = self.rooms.lock().unwrap();
            loop {
                let candidate: String =
                    Uuid::new_v4().simple().to_string()[..ROOM_ID_LEN].to_string();
                if !rooms.contains_key(&candidate) {
                    rooms.insert(candidate.clone(), RoomModel::new(candidate.clone()));
                    break candidate;
                }
                warn!(candidate = %candidate, "Room id collision, retrying");
            }
        };

        // A fresh id should never carry a pending timer; clear one anyway
        self.cancel_eviction(&room_id).await;

        info!(room_id = %room_id, "Room created");
        room_id
    }

    pub async fn exists(&self, room_id: &str) -> bool {
        self.rooms.lock().unwrap().contains_key(room_id)
    }

    pub async fn get(&self, room_id: &str) -> Option<RoomModel> {
        self.rooms.lock().unwrap().get(room_id).cloned()
    }

    /// Ids of all currently active rooms
    pub async fn list(&self) -> Vec<String> {
        self.rooms.lock().unwrap().keys().cloned().collect()
    }

    /// Refreshes a room's last-activity timestamp
    #[instrument(skip(self))]
    pub async fn record_activity(&self, room_id: &str) -> Result<(), AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        match rooms.get_mut(room_id) {
            Some(room) => {
                room.touch();
                Ok(())
            }
            None => Err(AppError::NotFound("Room not found".to_string())),
        }
    }

    /// Removes a room, cancelling any pending eviction and discarding its
    /// message history. Idempotent.
    #[instrument(skip(self))]
    pub async fn remove(&self, room_id: &str) {
        self.cancel_eviction(room_id).await;

        let removed = self.rooms.lock().unwrap().remove(room_id).is_some();
        if removed {
            self.message_log.clear(room_id).await;
            info!(room_id = %room_id, "Room removed");
        } else {
            debug!(room_id = %room_id, "Room already gone, nothing to remove");
        }
    }

    /// Starts a deferred eviction timer for a room, unless one is already
    /// pending or the room does not exist
    ///
    /// When the timer fires, existence and occupancy are re-verified
    /// against current state; a join/leave cycle during the grace window
    /// must not lead to a stale removal.
    pub async fn schedule_eviction(
        self: Arc<Self>,
        room_id: &str,
        ttl: Duration,
        occupancy: Arc<dyn RoomOccupancy>,
    ) {
        if !self.exists(room_id).await {
            debug!(room_id = %room_id, "Not scheduling eviction for unknown room");
            return;
        }

        let mut timers = self.eviction_timers.lock().unwrap();
        if timers.contains_key(room_id) {
            debug!(room_id = %room_id, "Eviction already pending, not stacking");
            return;
        }

        let registry = Arc::clone(&self);
        let room = room_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;

            // Drop our own handle first so remove() does not abort us
            registry.eviction_timers.lock().unwrap().remove(&room);

            if !registry.exists(&room).await {
                debug!(room_id = %room, "Eviction fired for already-removed room");
                return;
            }
            if occupancy.user_count(&room).await > 0 {
                debug!(room_id = %room, "Room repopulated during grace period, keeping");
                return;
            }

            info!(room_id = %room, "Grace period elapsed, evicting empty room");
            registry.remove(&room).await;
        });

        timers.insert(room_id.to_string(), handle);
        info!(room_id = %room_id, ttl_secs = ttl.as_secs(), "Eviction scheduled");
    }

    /// Cancels a pending eviction timer. Safe to call speculatively; no-op
    /// when nothing is pending.
    #[instrument(skip(self))]
    pub async fn cancel_eviction(&self, room_id: &str) {
        let handle = self.eviction_timers.lock().unwrap().remove(room_id);
        if let Some(handle) = handle {
            handle.abort();
            debug!(room_id = %room_id, "Pending eviction cancelled");
        }
    }

    /// Whether an eviction timer is currently pending for a room
    pub fn eviction_pending(&self, room_id: &str) -> bool {
        self.eviction_timers.lock().unwrap().contains_key(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::models::MessageKind;

    /// Occupancy stub reporting a fixed member count for every room
    struct FixedOccupancy(usize);

    #[async_trait]
    impl RoomOccupancy for FixedOccupancy {
        async fn user_count(&self, _room_id: &str) -> usize {
            self.0
        }
    }

    fn new_registry() -> (Arc<RoomRegistry>, Arc<MessageLog>) {
        let log = Arc::new(MessageLog::new(1000));
        (Arc::new(RoomRegistry::new(Arc::clone(&log))), log)
    }

    #[tokio::test]
    async fn test_create_room_generates_unique_ids() {
        let (registry, _) = new_registry();

        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            let id = registry.create_room().await;
            assert_eq!(id.len(), 10);
            assert!(ids.insert(id), "duplicate room id among active rooms");
        }

        assert_eq!(registry.list().await.len(), 100);
    }

    #[tokio::test]
    async fn test_exists_and_list() {
        let (registry, _) = new_registry();

        assert!(!registry.exists("nope").await);
        let id = registry.create_room().await;
        assert!(registry.exists(&id).await);
        assert_eq!(registry.list().await, vec![id]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_clears_history() {
        let (registry, log) = new_registry();

        let id = registry.create_room().await;
        log.append(&id, MessageKind::Chat, "alice", "hello").await;
        assert_eq!(log.count(&id).await, 1);

        registry.remove(&id).await;
        assert!(!registry.exists(&id).await);
        assert_eq!(log.count(&id).await, 0);

        // Second removal is a no-op
        registry.remove(&id).await;
        assert!(!registry.exists(&id).await);
    }

    #[tokio::test]
    async fn test_record_activity_updates_timestamp() {
        let (registry, _) = new_registry();

        let id = registry.create_room().await;
        let initial = registry.get(&id).await.unwrap().last_activity;

        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.record_activity(&id).await.unwrap();

        let updated = registry.get(&id).await.unwrap().last_activity;
        assert!(updated > initial);
    }

    #[tokio::test]
    async fn test_record_activity_nonexistent_room() {
        let (registry, _) = new_registry();

        let result = registry.record_activity("nonexistent").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_eviction_fires_for_empty_room() {
        let (registry, log) = new_registry();

        let id = registry.create_room().await;
        log.append(&id, MessageKind::Chat, "alice", "hello").await;

        Arc::clone(&registry)
            .schedule_eviction(&id, Duration::from_millis(20), Arc::new(FixedOccupancy(0)))
            .await;
        assert!(registry.eviction_pending(&id));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!registry.exists(&id).await);
        assert!(!registry.eviction_pending(&id));
        assert_eq!(log.count(&id).await, 0);
    }

    #[tokio::test]
    async fn test_eviction_respects_current_occupancy() {
        let (registry, _) = new_registry();

        let id = registry.create_room().await;
        Arc::clone(&registry)
            .schedule_eviction(&id, Duration::from_millis(20), Arc::new(FixedOccupancy(1)))
            .await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Fired, re-checked membership, kept the room
        assert!(registry.exists(&id).await);
        assert!(!registry.eviction_pending(&id));
    }

    #[tokio::test]
    async fn test_cancel_eviction_keeps_room() {
        let (registry, _) = new_registry();

        let id = registry.create_room().await;
        Arc::clone(&registry)
            .schedule_eviction(&id, Duration::from_millis(20), Arc::new(FixedOccupancy(0)))
            .await;
        registry.cancel_eviction(&id).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(registry.exists(&id).await);
    }

    #[tokio::test]
    async fn test_cancel_eviction_without_timer_is_noop() {
        let (registry, _) = new_registry();
        let id = registry.create_room().await;

        // Nothing pending, speculative cancel must be safe
        registry.cancel_eviction(&id).await;
        assert!(registry.exists(&id).await);
    }

    #[tokio::test]
    async fn test_schedule_does_not_stack_timers() {
        let (registry, _) = new_registry();

        let id = registry.create_room().await;
        Arc::clone(&registry)
            .schedule_eviction(&id, Duration::from_millis(30), Arc::new(FixedOccupancy(0)))
            .await;
        Arc::clone(&registry)
            .schedule_eviction(&id, Duration::from_millis(30), Arc::new(FixedOccupancy(0)))
            .await;

        // One cancel must clear the only timer; a stacked second timer
        // would still evict the room below
        registry.cancel_eviction(&id).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(registry.exists(&id).await);
    }

    #[tokio::test]
    async fn test_schedule_for_unknown_room_is_noop() {
        let (registry, _) = new_registry();

        Arc::clone(&registry)
            .schedule_eviction(
                "nonexistent",
                Duration::from_millis(10),
                Arc::new(FixedOccupancy(0)),
            )
            .await;

        assert!(!registry.eviction_pending("nonexistent"));
    }
}
