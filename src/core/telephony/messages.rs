//! Telephony media-stream WebSocket message types.
//!
//! The telephony leg speaks a JSON event stream keyed on `event`:
//!
//! Inbound (from the carrier):
//! - connected - Socket handshake acknowledgement
//! - start - Stream metadata, carries `streamSid`
//! - media - One base64 μ-law@8kHz frame
//! - mark - Playback marker echo
//! - stop - Caller hung up / stream ended
//!
//! Outbound (to the carrier):
//! - media - One base64 μ-law@8kHz frame for playback

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound Events
// =============================================================================

/// Events received from the telephony carrier.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Handshake acknowledgement
    Connected {},

    /// Stream started
    Start {
        /// Stream metadata
        #[serde(default)]
        start: Option<StartMetadata>,
        /// Top-level stream identifier (sent by some carriers)
        #[serde(default, rename = "streamSid")]
        stream_sid: Option<String>,
    },

    /// Audio frame
    Media {
        /// Media payload
        #[serde(default)]
        media: Option<MediaPayload>,
    },

    /// Playback marker
    Mark {},

    /// Stream ended
    Stop {},

    /// Any event type this bridge does not know about
    #[serde(other)]
    Unknown,
}

impl TelephonyEvent {
    /// Stream identifier carried by a `start` event, from either location.
    pub fn stream_sid(&self) -> Option<&str> {
        match self {
            TelephonyEvent::Start { start, stream_sid } => start
                .as_ref()
                .and_then(|s| s.stream_sid.as_deref())
                .or(stream_sid.as_deref()),
            _ => None,
        }
    }
}

/// Metadata of a `start` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartMetadata {
    /// Stream identifier
    #[serde(default, rename = "streamSid")]
    pub stream_sid: Option<String>,
    /// Call identifier
    #[serde(default, rename = "callSid")]
    pub call_sid: Option<String>,
}

/// Payload of a `media` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded μ-law audio
    #[serde(default)]
    pub payload: Option<String>,
}

// =============================================================================
// Outbound Events
// =============================================================================

/// Events sent to the telephony carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyOutgoing {
    /// Audio frame for playback
    Media {
        /// Stream identifier, when the carrier requires it
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        /// Media payload
        media: OutgoingMedia,
    },
}

impl TelephonyOutgoing {
    /// Build a media event from an already base64-encoded μ-law payload.
    pub fn media(stream_sid: Option<String>, payload: String) -> Self {
        TelephonyOutgoing::Media {
            stream_sid,
            media: OutgoingMedia { payload },
        }
    }
}

/// Outbound media payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMedia {
    /// Base64-encoded μ-law audio
    pub payload: String,
}
