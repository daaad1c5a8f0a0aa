//! OpenAI Realtime API configuration types.
//!
//! This module contains configuration types for the Voice Transport:
//! - Voice selection
//! - Audio format negotiation and its wire schema
//! - Turn policy (bridge-driven commits vs. server-side VAD)

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::codec::{AudioEncoding, SampleRate};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice
    Alloy,
    /// Ash voice
    Ash,
    /// Ballad voice
    Ballad,
    /// Cedar voice
    Cedar,
    /// Coral voice
    Coral,
    /// Echo voice
    Echo,
    /// Marin voice (default)
    #[default]
    Marin,
    /// Sage voice
    Sage,
    /// Shimmer voice
    Shimmer,
    /// Verse voice
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Cedar => "cedar",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Marin => "marin",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match Self::all()
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
        {
            Some(voice) => voice,
            None => {
                let fallback = Self::default();
                warn!("Unknown voice '{}', using '{}'", s, fallback);
                fallback
            }
        }
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Cedar,
            Self::Coral,
            Self::Echo,
            Self::Marin,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio format negotiated with the Voice Transport, used for both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceAudioFormat {
    /// G.711 μ-law at 8kHz. Matches the telephony codec, so output audio
    /// passes through untouched.
    #[default]
    G711Ulaw,
    /// PCM 16-bit little-endian at 8kHz
    Pcm16Narrowband,
    /// PCM 16-bit little-endian at 16kHz
    Pcm16Wideband,
}

impl VoiceAudioFormat {
    /// Configuration name of this format.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G711Ulaw => "g711_ulaw",
            Self::Pcm16Narrowband => "pcm16_8k",
            Self::Pcm16Wideband => "pcm16_16k",
        }
    }

    /// Parse a configuration name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "g711_ulaw" | "ulaw" | "mulaw" => Some(Self::G711Ulaw),
            "pcm16_8k" | "pcm16_8000" => Some(Self::Pcm16Narrowband),
            "pcm16_16k" | "pcm16_16000" | "pcm16" => Some(Self::Pcm16Wideband),
            _ => None,
        }
    }

    /// Wire encoding.
    #[inline]
    pub fn encoding(&self) -> AudioEncoding {
        match self {
            Self::G711Ulaw => AudioEncoding::Ulaw,
            Self::Pcm16Narrowband | Self::Pcm16Wideband => AudioEncoding::Pcm16,
        }
    }

    /// Sample rate on the Voice Transport side.
    #[inline]
    pub fn sample_rate(&self) -> SampleRate {
        match self {
            Self::G711Ulaw | Self::Pcm16Narrowband => SampleRate::Hz8000,
            Self::Pcm16Wideband => SampleRate::Hz16000,
        }
    }

    /// Whether audio can be relayed without any transcoding.
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::G711Ulaw)
    }

    /// Describe this format on the wire using `schema`.
    pub fn descriptor(&self, schema: FormatSchema) -> FormatDescriptor {
        match schema {
            FormatSchema::Legacy => FormatDescriptor::Name(
                match self.encoding() {
                    AudioEncoding::Ulaw => "g711_ulaw",
                    AudioEncoding::Pcm16 => "pcm16",
                }
                .to_string(),
            ),
            FormatSchema::Structured => FormatDescriptor::Structured {
                format_type: match self.encoding() {
                    AudioEncoding::Ulaw => "audio/pcmu",
                    AudioEncoding::Pcm16 => "audio/pcm",
                }
                .to_string(),
                sample_rate_hz: self.sample_rate().hz(),
            },
        }
    }
}

impl std::fmt::Display for VoiceAudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape used to express audio formats in `session.update`.
///
/// Resolved once from configuration; call sites never branch on shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatSchema {
    /// Bare format string, e.g. `"g711_ulaw"`
    #[default]
    Legacy,
    /// Structured object, e.g. `{"type": "audio/pcm", "sample_rate_hz": 16000}`
    Structured,
}

impl FormatSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Structured => "structured",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "string" | "v1" => Some(Self::Legacy),
            "structured" | "object" | "v2" => Some(Self::Structured),
            _ => None,
        }
    }
}

/// Wire form of an audio format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormatDescriptor {
    /// Bare format string
    Name(String),
    /// Structured format object
    Structured {
        #[serde(rename = "type")]
        format_type: String,
        sample_rate_hz: u32,
    },
}

// =============================================================================
// Turn Policy
// =============================================================================

/// Who decides when the caller's turn has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPolicy {
    /// The bridge buffers caller audio, commits it and requests responses.
    /// Server-side VAD is disabled.
    #[default]
    Buffered,
    /// The Voice Transport's own VAD ends turns and starts responses; the
    /// bridge only streams audio.
    ServerVad,
}

impl TurnPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::ServerVad => "server_vad",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "buffered" | "bridge" | "manual" => Some(Self::Buffered),
            "server_vad" | "vad" => Some(Self::ServerVad),
            _ => None,
        }
    }
}

// =============================================================================
// Modalities
// =============================================================================

/// Output modalities for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text output
    Text,
    /// Audio output
    Audio,
}

impl Modality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }
}

/// Modalities requested for every response: audio first, with a text transcript.
pub fn response_modalities() -> Vec<String> {
    [Modality::Audio, Modality::Text]
        .iter()
        .map(|m| m.as_str().to_string())
        .collect()
}
