//! Voice Transport: the realtime speech-to-speech AI session.

mod base;
pub mod client;
mod config;
mod messages;

pub use base::{RealtimeError, RealtimeResult};
pub use client::{VoiceStream, build_voice_request, build_voice_url, connect_voice};
pub use config::{
    DEFAULT_REALTIME_MODEL, FormatDescriptor, FormatSchema, Modality, OPENAI_REALTIME_URL,
    OpenAIRealtimeVoice, TurnPolicy, VoiceAudioFormat, response_modalities,
};
pub use messages::{
    ApiError, ClientEvent, ResponseConfig, ResponseInfo, ServerEvent, SessionConfig, SessionInfo,
    TurnDetection,
};
