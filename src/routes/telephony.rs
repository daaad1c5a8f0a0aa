//! Telephony WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::telephony::telephony_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the Telephony WebSocket router
///
/// # Endpoint
///
/// `GET <path>` - WebSocket upgrade for the carrier's media stream
///
/// # Protocol
///
/// The carrier sends JSON events keyed on `event`:
/// - `start` with the stream identifier
/// - `media` with base64 μ-law@8kHz audio
/// - `stop` when the call ends
///
/// The bridge answers with `media` events carrying the AI's voice.
pub fn create_telephony_router(path: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, get(telephony_handler))
        .layer(TraceLayer::new_for_http())
}
