//! Telephony WebSocket handler
//!
//! Accepts the carrier's media-stream upgrade and hands the socket to the
//! Session Manager for the lifetime of the call.

use std::sync::Arc;

use axum::{
    extract::{State, ws::WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::core::bridge::run_call;
use crate::state::AppState;

/// Maximum WebSocket message size (1 MB); telephony frames are tiny
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Telephony WebSocket handler
///
/// Refuses the upgrade with 503 when no Voice Transport credential is
/// configured, so no socket is created for a call that cannot be bridged.
pub async fn telephony_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.config.has_voice_credential() {
        warn!("Refusing telephony upgrade: OPENAI_API_KEY is not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Voice transport credential is not configured",
        )
            .into_response();
    }

    info!("Telephony WebSocket upgrade requested");
    let config = state.config.clone();
    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| run_call(socket, config))
}
