use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state.
///
/// Holds only immutable configuration; every call owns its own session state.
#[derive(Debug)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
        })
    }
}
