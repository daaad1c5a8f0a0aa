use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod api;
pub mod telephony;

/// Build the complete application router.
///
/// Serves the health check on `/` and the Telephony upgrade on the configured
/// path; every other path is a 404.
pub fn create_app(state: Arc<AppState>) -> Router {
    let telephony_path = state.config.bridge.telephony_path.clone();
    api::create_api_router()
        .merge(telephony::create_telephony_router(&telephony_path))
        .with_state(state)
}
