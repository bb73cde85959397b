// Library crate for the Parlor chat broker
// This file exposes the public API for integration tests

pub mod message;
pub mod room;
pub mod session;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use message::log::MessageLog;
pub use message::models::{Message, MessageKind};
pub use room::registry::{RoomOccupancy, RoomRegistry};
pub use session::store::SessionStore;
pub use shared::{AppError, AppState, BrokerConfig};
pub use websockets::{ConnectionHub, MalformedPayload, RoomConnection, WireMessage};
