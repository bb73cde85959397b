use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::messages::WireMessage;
use crate::room::registry::{RoomOccupancy, RoomRegistry};

// room_id -> connections in join order
type MembershipMap = HashMap<String, Vec<RoomConnection>>;

/// One live connection registered in a room
///
/// Outbound traffic goes through the unbounded sender; the receiving half
/// lives in the connection's socket task.
#[derive(Clone)]
pub struct RoomConnection {
    pub id: String,
    pub username: String,
    sender: mpsc::UnboundedSender<String>,
}

impl RoomConnection {
    pub fn new(username: String, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            sender,
        }
    }

    fn send(&self, text: String) -> bool {
        self.sender.send(text).is_ok()
    }
}

/// Live occupancy view handed to the registry's eviction timers, so a
/// firing timer checks membership as it is then, not as it was when the
/// room emptied
struct HubOccupancy {
    connections: Arc<RwLock<MembershipMap>>,
}

#[async_trait]
impl RoomOccupancy for HubOccupancy {
    async fn user_count(&self, room_id: &str) -> usize {
        let connections = self.connections.read().await;
        connections.get(room_id).map_or(0, |members| members.len())
    }
}

/// Tracks live connections per room and fans messages out to them
///
/// On every connect any pending eviction for the room is cancelled; when
/// the last connection leaves, a deferred eviction is scheduled with the
/// registry.
pub struct ConnectionHub {
    connections: Arc<RwLock<MembershipMap>>,
    registry: Arc<RoomRegistry>,
    grace_ttl: Duration,
}

impl ConnectionHub {
    pub fn new(registry: Arc<RoomRegistry>, grace_ttl: Duration) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            registry,
            grace_ttl,
        }
    }

    /// Registers a connection under a room and cancels any pending
    /// eviction for it
    #[instrument(skip(self, connection), fields(connection_id = %connection.id))]
    pub async fn connect(&self, room_id: &str, connection: RoomConnection) {
        {
            let mut connections = self.connections.write().await;
            connections
                .entry(room_id.to_string())
                .or_default()
                .push(connection);
        }

        // Speculative and idempotent; a fresh room has nothing pending
        self.registry.cancel_eviction(room_id).await;
    }

    /// Removes a connection from a room's membership
    ///
    /// Returns whether the room became empty; an empty room gets a
    /// deferred eviction scheduled with the registry.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, room_id: &str, connection_id: &str) -> bool {
        let became_empty = {
            let mut connections = self.connections.write().await;
            match connections.get_mut(room_id) {
                Some(members) => {
                    members.retain(|c| c.id != connection_id);
                    if members.is_empty() {
                        connections.remove(room_id);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if became_empty {
            debug!(room_id = %room_id, "Last connection left, scheduling room eviction");
            let occupancy = Arc::new(HubOccupancy {
                connections: Arc::clone(&self.connections),
            });
            Arc::clone(&self.registry)
                .schedule_eviction(room_id, self.grace_ttl, occupancy)
                .await;
        }

        became_empty
    }

    /// Sends an event to every connection currently in a room
    ///
    /// The payload is serialized once and delivery runs over a snapshot of
    /// the membership, so a failing or concurrently-departing connection
    /// never blocks its siblings. Failed sends are left for that
    /// connection's own disconnect path.
    #[instrument(skip(self, event))]
    pub async fn broadcast(&self, room_id: &str, event: &WireMessage) {
        self.fan_out(room_id, event, None).await;
    }

    /// Like `broadcast`, skipping one connection (typing relay does not
    /// echo the sender)
    #[instrument(skip(self, event))]
    pub async fn broadcast_except(&self, room_id: &str, event: &WireMessage, excluded_id: &str) {
        self.fan_out(room_id, event, Some(excluded_id)).await;
    }

    /// Current membership size; 0 for unknown rooms
    pub async fn room_user_count(&self, room_id: &str) -> usize {
        let connections = self.connections.read().await;
        connections.get(room_id).map_or(0, |members| members.len())
    }

    async fn fan_out(&self, room_id: &str, event: &WireMessage, excluded_id: Option<&str>) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Failed to serialize broadcast event");
                return;
            }
        };

        // Snapshot the membership so sends never hold the registration lock
        let targets: Vec<RoomConnection> = {
            let connections = self.connections.read().await;
            match connections.get(room_id) {
                Some(members) => members
                    .iter()
                    .filter(|c| excluded_id != Some(c.id.as_str()))
                    .cloned()
                    .collect(),
                None => return,
            }
        };

        for connection in &targets {
            if !connection.send(text.clone()) {
                // Receiver is gone; its disconnect path will reap it
                debug!(
                    room_id = %room_id,
                    connection_id = %connection.id,
                    "Dropping broadcast to closed connection"
                );
            }
        }
    }
}
