//! Crate-level error type for bridging a call.

use thiserror::Error;

use crate::core::realtime::RealtimeError;

/// Reasons a call could not be bridged.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No Voice Transport credential configured
    #[error("Voice transport credential is not configured")]
    MissingCredential,

    /// The Voice Transport connection could not be established
    #[error("Voice transport unavailable: {0}")]
    VoiceConnect(#[from] RealtimeError),

    /// The caller left before the Voice Transport was ready
    #[error("Telephony connection closed before the session started")]
    TelephonyClosed,
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
