// Public API - what other modules can use
pub use handler::{websocket_handler, ChatMessageHandler};
pub use hub::{ConnectionHub, RoomConnection};
pub use messages::{ClientMessage, MalformedPayload, WireMessage};
pub use socket::{Connection, MessageHandler, SocketWrapper};

// Internal modules
pub mod handler;
pub mod hub;
pub mod messages;
pub mod socket;
