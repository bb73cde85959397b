// Public API - what other modules can use
pub use handlers::{create_session, delete_session, get_current_session};

// Internal modules
mod handlers;
pub mod models;
pub mod store;
pub mod sweeper;
mod types;
