//! Telephony media-stream transport.
//!
//! Carries the caller's audio as base64 G.711 μ-law at 8kHz inside a JSON
//! event stream over a WebSocket.

mod messages;

pub use messages::{MediaPayload, OutgoingMedia, StartMetadata, TelephonyEvent, TelephonyOutgoing};
