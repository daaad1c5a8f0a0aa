pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::{BridgeConfig, ServerConfig};
pub use errors::{BridgeError, BridgeResult};
pub use state::AppState;
