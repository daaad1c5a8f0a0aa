//! Voice Transport WebSocket message types.
//!
//! All events are JSON objects discriminated by `type`.
//!
//! Client events (sent by the bridge):
//! - session.update - Configure voice, formats, instructions, turn detection
//! - input_audio_buffer.append - Append audio to the input buffer
//! - input_audio_buffer.commit - Close the current user turn
//! - response.create - Ask for a response
//! - response.cancel - Abandon the response in flight
//!
//! Server events (handled by the bridge):
//! - error / response.error - Error occurred
//! - session.created / session.updated - Session lifecycle
//! - response.created - Response generation started
//! - response.audio.delta / response.output_audio.delta - Audio chunk
//! - response.audio_transcript.delta - Transcript chunk
//! - response.done / response.completed - Response complete
//!
//! Anything else decodes to [`ServerEvent::Unknown`] and is ignored.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::FormatDescriptor;

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration carried by `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    /// Response modalities (audio, text)
    pub modalities: Vec<String>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    pub voice: String,

    /// Input audio format
    pub input_audio_format: FormatDescriptor,

    /// Output audio format
    pub output_audio_format: FormatDescriptor,

    /// Turn detection; serialized as `null` when the bridge drives turns
    pub turn_detection: Option<TurnDetection>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

impl TurnDetection {
    /// Server VAD with provider defaults.
    pub fn server_vad() -> Self {
        TurnDetection::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

/// Per-response configuration for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseConfig {
    /// Response modalities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// Instructions for this response only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Conversation to attach the response to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
}

// =============================================================================
// Client Events
// =============================================================================

/// Client events sent to the Voice Transport.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Response configuration
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    /// Cancel the current response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// Append base64-encoded audio bytes.
    pub fn append_audio(bytes: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(bytes),
        }
    }

    /// Build a `response.create`.
    ///
    /// Empty `instructions` produce a request with no instruction override.
    pub fn response_create(instructions: &str, modalities: Vec<String>) -> Self {
        let instructions = if instructions.trim().is_empty() {
            None
        } else {
            Some(instructions.to_string())
        };
        ClientEvent::ResponseCreate {
            response: Some(ResponseConfig {
                modalities: Some(modalities),
                instructions,
                conversation: Some("auto".to_string()),
            }),
        }
    }

    /// Wire name of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::ResponseCreate { .. } => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Server events received from the Voice Transport.
///
/// Fields are lenient: a known event with missing fields still decodes, and
/// the handler decides what a missing field means.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error", alias = "response.error")]
    Error {
        #[serde(default)]
        error: Option<ApiError>,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Option<SessionInfo>,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: Option<SessionInfo>,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
    },

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    /// Input audio buffer committed
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    /// Audio chunk
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta {
        /// Base64-encoded audio
        #[serde(default)]
        delta: Option<String>,
        #[serde(default)]
        response_id: Option<String>,
    },

    /// Transcript chunk of the spoken response
    #[serde(
        rename = "response.audio_transcript.delta",
        alias = "response.output_audio_transcript.delta"
    )]
    AudioTranscriptDelta {
        #[serde(default)]
        delta: Option<String>,
    },

    /// Response complete
    #[serde(rename = "response.done", alias = "response.completed")]
    ResponseDone {
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    /// Rate limits updated
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {},

    /// Any other event type
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.error_type.as_deref().unwrap_or("unknown"),
            self.code.as_deref().unwrap_or("-"),
            self.message.as_deref().unwrap_or("no message")
        )
    }
}

/// Session information echoed by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Response information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
