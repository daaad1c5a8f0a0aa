/// Health check body served on `GET /`.
pub const HEALTH_MESSAGE: &str = "Telephony <-> Realtime voice bridge running.";

/// Health check handler
///
/// Always returns 200 with a plain-text body; it does not probe the Voice
/// Transport.
pub async fn health_check() -> &'static str {
    HEALTH_MESSAGE
}
