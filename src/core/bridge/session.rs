//! One bridged call.
//!
//! The session reacts to one inbound message at a time from either leg and
//! emits outbound messages as routes on two channels. It never touches a
//! socket directly, so every relay rule can be exercised with plain channels.

use std::fmt;

use base64::prelude::*;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::BridgeConfig;
use crate::core::buffer::AudioBuffer;
use crate::core::codec::{
    self, AudioEncoding, AudioFrame, SampleRate, decode_mulaw, downsample_2x, encode_mulaw,
    pcm16_from_le_bytes, pcm16_to_le_bytes, upsample_2x,
};
use crate::core::realtime::{
    ClientEvent, FormatSchema, OpenAIRealtimeVoice, ServerEvent, SessionConfig, TurnDetection,
    TurnPolicy, VoiceAudioFormat, response_modalities,
};
use crate::core::telephony::{TelephonyEvent, TelephonyOutgoing};
use crate::core::turn::{TurnCoordinator, TurnState};

/// Transcript text kept per response for the completion log
const MAX_TRANSCRIPT_BYTES: usize = 8 * 1024;

/// Messages routed to the Voice Transport writer.
#[derive(Debug)]
pub enum VoiceRoute {
    /// JSON control or audio event
    Event(ClientEvent),
    /// Heartbeat ping
    Ping(Bytes),
    /// Close connection
    Close,
}

/// Messages routed to the Telephony Transport writer.
#[derive(Debug)]
pub enum TelephonyRoute {
    /// JSON media event
    Outgoing(TelephonyOutgoing),
    /// Heartbeat ping
    Ping(Bytes),
    /// Close connection
    Close,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Telephony upgraded, Voice connection in progress
    #[default]
    Connecting,
    /// Both legs up, relaying
    Active,
    /// Teardown started; nothing more is forwarded
    Closing,
    /// Both legs released
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "CONNECTING"),
            SessionState::Active => write!(f, "ACTIVE"),
            SessionState::Closing => write!(f, "CLOSING"),
            SessionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Per-session counters, logged at teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Telephony media frames decoded
    pub frames_in: u64,
    /// Media frames sent to the caller
    pub frames_out: u64,
    /// Buffer flushes (append + commit) to the Voice Transport
    pub flushes: u64,
    /// Malformed or empty frames dropped, either direction
    pub dropped_frames: u64,
}

/// Relay state for one call.
pub struct Session {
    connection_id: String,
    stream_sid: Option<String>,
    state: SessionState,

    format: VoiceAudioFormat,
    schema: FormatSchema,
    policy: TurnPolicy,
    voice: OpenAIRealtimeVoice,
    instructions: Option<String>,
    greeting: Option<String>,
    include_stream_sid: bool,
    flush_threshold: usize,

    buffer: AudioBuffer,
    turn: TurnCoordinator,
    transcript: String,
    stats: SessionStats,

    voice_tx: mpsc::Sender<VoiceRoute>,
    telephony_tx: mpsc::Sender<TelephonyRoute>,
}

impl Session {
    /// Create a session in the `Connecting` state.
    pub fn new(
        connection_id: impl Into<String>,
        config: &BridgeConfig,
        voice_tx: mpsc::Sender<VoiceRoute>,
        telephony_tx: mpsc::Sender<TelephonyRoute>,
    ) -> Self {
        let format = config.audio_format;
        // Under server VAD the Voice Transport owns response requests
        let watchdog = match config.turn_policy {
            TurnPolicy::Buffered => config.response_watchdog(),
            TurnPolicy::ServerVad => None,
        };
        Self {
            connection_id: connection_id.into(),
            stream_sid: None,
            state: SessionState::Connecting,
            format,
            schema: config.format_schema,
            policy: config.turn_policy,
            voice: config.voice,
            instructions: config.system_instructions.clone(),
            greeting: config.greeting.clone(),
            include_stream_sid: config.include_stream_sid,
            flush_threshold: config.flush_threshold_samples(),
            buffer: AudioBuffer::new(format.sample_rate()),
            turn: TurnCoordinator::new(watchdog),
            transcript: String::new(),
            stats: SessionStats::default(),
            voice_tx,
            telephony_tx,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn.state()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Samples waiting in the Audio Buffer.
    pub fn buffered_samples(&self) -> usize {
        self.buffer.sample_count()
    }

    /// Whether teardown has started.
    pub fn is_closing(&self) -> bool {
        matches!(self.state, SessionState::Closing | SessionState::Closed)
    }

    /// Configure the Voice session and request the greeting.
    ///
    /// Called once the Voice Transport is connected; moves the session to
    /// `Active`.
    pub async fn start(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }

        let descriptor = self.format.descriptor(self.schema);
        let turn_detection = match self.policy {
            TurnPolicy::Buffered => None,
            TurnPolicy::ServerVad => Some(TurnDetection::server_vad()),
        };
        let update = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: response_modalities(),
                instructions: self.instructions.clone(),
                voice: self.voice.as_str().to_string(),
                input_audio_format: descriptor.clone(),
                output_audio_format: descriptor,
                turn_detection,
            },
        };
        self.send_voice(update).await;

        if let Some(greeting) = self.greeting.clone() {
            self.request_response(&greeting).await;
        }

        self.state = SessionState::Active;
        info!(
            connection_id = %self.connection_id,
            format = %self.format,
            policy = self.policy.as_str(),
            voice = %self.voice,
            "Session active"
        );
    }

    // =========================================================================
    // Telephony -> Voice
    // =========================================================================

    /// Handle one text message from the Telephony Transport.
    pub async fn handle_telephony_text(&mut self, text: &str) {
        if self.is_closing() {
            return;
        }

        let event: TelephonyEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    connection_id = %self.connection_id,
                    "Failed to parse telephony event: {}", e
                );
                return;
            }
        };

        match event {
            TelephonyEvent::Start { ref start, .. } => {
                let call_sid = start.as_ref().and_then(|s| s.call_sid.clone());
                if let Some(sid) = event.stream_sid() {
                    self.stream_sid = Some(sid.to_string());
                }
                info!(
                    connection_id = %self.connection_id,
                    stream_sid = ?self.stream_sid,
                    call_sid = ?call_sid,
                    "Telephony stream started"
                );
            }
            TelephonyEvent::Media { media } => {
                let payload = media.and_then(|m| m.payload);
                self.handle_media(payload).await;
            }
            TelephonyEvent::Stop {} => {
                info!(connection_id = %self.connection_id, "Telephony stream stopped");
                self.finish_call().await;
            }
            TelephonyEvent::Connected {} | TelephonyEvent::Mark {} => {
                trace!(connection_id = %self.connection_id, "Ignoring telephony control event");
            }
            TelephonyEvent::Unknown => {
                debug!(connection_id = %self.connection_id, "Ignoring unknown telephony event");
            }
        }
    }

    async fn handle_media(&mut self, payload: Option<String>) {
        let Some(payload) = payload else {
            self.drop_frame("missing payload");
            return;
        };
        let ulaw = match BASE64_STANDARD.decode(payload.as_bytes()) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                self.drop_frame("empty payload");
                return;
            }
            Err(e) => {
                self.drop_frame(&format!("invalid base64: {e}"));
                return;
            }
        };
        self.stats.frames_in += 1;

        match self.policy {
            TurnPolicy::Buffered => {
                let mut samples = decode_mulaw(&ulaw);
                if self.format.sample_rate() == SampleRate::Hz16000 {
                    samples = upsample_2x(&samples);
                }
                let frame = AudioFrame::pcm16(self.format.sample_rate(), samples);
                if let Err(e) = self.buffer.append(frame) {
                    self.drop_frame(&e.to_string());
                    return;
                }
                self.maybe_flush().await;
            }
            TurnPolicy::ServerVad => {
                let audio = if self.format.is_passthrough() {
                    payload
                } else {
                    BASE64_STANDARD.encode(self.pcm_for_voice(decode_mulaw(&ulaw)))
                };
                self.send_voice(ClientEvent::InputAudioBufferAppend { audio })
                    .await;
            }
        }
    }

    /// Flush the Audio Buffer when the threshold is met and the AI is silent.
    ///
    /// While a response is outstanding audio keeps accumulating; nothing is
    /// dropped.
    async fn maybe_flush(&mut self) {
        if !self.buffer.ready_to_flush(self.flush_threshold) {
            return;
        }
        if !self.turn.is_idle() {
            trace!(
                connection_id = %self.connection_id,
                buffered_ms = self.buffer.duration_ms(),
                "Holding caller audio while AI is speaking"
            );
            return;
        }
        self.flush_buffer().await;
        self.request_response("").await;
    }

    /// Send the whole buffer as one append followed by a commit.
    async fn flush_buffer(&mut self) {
        let samples = self.buffer.drain_all();
        if samples.is_empty() {
            return;
        }
        let bytes = match self.format.encoding() {
            AudioEncoding::Ulaw => encode_mulaw(&samples),
            AudioEncoding::Pcm16 => pcm16_to_le_bytes(&samples),
        };
        debug!(
            connection_id = %self.connection_id,
            samples = samples.len(),
            "Flushing caller audio"
        );
        self.send_voice(ClientEvent::append_audio(&bytes)).await;
        self.send_voice(ClientEvent::InputAudioBufferCommit).await;
        self.stats.flushes += 1;
    }

    /// Convert 8kHz PCM16 telephony audio to the Voice wire encoding.
    fn pcm_for_voice(&self, samples: Vec<i16>) -> Vec<u8> {
        let samples = match self.format.sample_rate() {
            SampleRate::Hz16000 => upsample_2x(&samples),
            SampleRate::Hz8000 => samples,
        };
        match self.format.encoding() {
            AudioEncoding::Ulaw => encode_mulaw(&samples),
            AudioEncoding::Pcm16 => pcm16_to_le_bytes(&samples),
        }
    }

    /// Caller hung up: flush what is left, cancel the AI, close both legs.
    async fn finish_call(&mut self) {
        if self.policy == TurnPolicy::Buffered {
            self.flush_buffer().await;
        }
        self.send_voice(ClientEvent::ResponseCancel).await;
        self.close().await;
    }

    // =========================================================================
    // Voice -> Telephony
    // =========================================================================

    /// Handle one text message from the Voice Transport.
    pub async fn handle_voice_text(&mut self, text: &str) {
        if self.is_closing() {
            return;
        }

        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    connection_id = %self.connection_id,
                    "Failed to parse voice event: {}", e
                );
                return;
            }
        };

        match event {
            ServerEvent::AudioDelta { delta, .. } => {
                self.turn.on_audio_delta();
                match delta {
                    Some(delta) => self.forward_audio(delta).await,
                    None => self.drop_frame("audio delta without payload"),
                }
            }
            ServerEvent::AudioTranscriptDelta { delta } => {
                if let Some(delta) = delta {
                    if self.transcript.len() + delta.len() <= MAX_TRANSCRIPT_BYTES {
                        self.transcript.push_str(&delta);
                    }
                }
            }
            ServerEvent::ResponseCreated { response } => {
                self.turn.on_response_created(Instant::now());
                debug!(
                    connection_id = %self.connection_id,
                    response_id = ?response.and_then(|r| r.id),
                    "Response created"
                );
            }
            ServerEvent::ResponseDone { response } => {
                self.turn.on_response_done();
                let status = response.and_then(|r| r.status);
                if !self.transcript.is_empty() {
                    debug!(
                        connection_id = %self.connection_id,
                        "Assistant said: {}", self.transcript
                    );
                    self.transcript.clear();
                }
                debug!(
                    connection_id = %self.connection_id,
                    status = ?status,
                    "Response done"
                );
            }
            ServerEvent::Error { error } => {
                warn!(
                    connection_id = %self.connection_id,
                    "Voice transport error: {}",
                    error.unwrap_or_default()
                );
                self.turn.on_error();
                self.transcript.clear();
            }
            ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
                debug!(
                    connection_id = %self.connection_id,
                    session_id = ?session.and_then(|s| s.id),
                    "Voice session configured"
                );
            }
            ServerEvent::SpeechStarted { .. }
            | ServerEvent::SpeechStopped { .. }
            | ServerEvent::InputAudioBufferCommitted { .. }
            | ServerEvent::RateLimitsUpdated {} => {
                trace!(connection_id = %self.connection_id, "Voice lifecycle event");
            }
            ServerEvent::Unknown => {
                trace!(connection_id = %self.connection_id, "Ignoring unknown voice event");
            }
        }
    }

    async fn forward_audio(&mut self, delta: String) {
        let payload = if self.format.is_passthrough() {
            let valid = matches!(
                BASE64_STANDARD.decode(delta.as_bytes()),
                Ok(bytes) if !bytes.is_empty()
            );
            if !valid {
                self.drop_frame("malformed audio delta");
                return;
            }
            delta
        } else {
            match self.transcode_for_caller(&delta) {
                Ok(ulaw) if !ulaw.is_empty() => BASE64_STANDARD.encode(ulaw),
                Ok(_) => {
                    self.drop_frame("empty audio delta");
                    return;
                }
                Err(e) => {
                    self.drop_frame(&e.to_string());
                    return;
                }
            }
        };

        let stream_sid = if self.include_stream_sid {
            self.stream_sid.clone()
        } else {
            None
        };
        self.send_telephony(TelephonyOutgoing::media(stream_sid, payload))
            .await;
        self.stats.frames_out += 1;
    }

    /// PCM16 (8 or 16kHz) from the Voice Transport to μ-law@8kHz.
    fn transcode_for_caller(&self, delta: &str) -> codec::CodecResult<Vec<u8>> {
        let bytes = ServerEvent::decode_audio_delta(delta)
            .map_err(|e| codec::CodecError::MalformedAudio(e.to_string()))?;
        let mut samples = pcm16_from_le_bytes(&bytes)?;
        if self.format.sample_rate() == SampleRate::Hz16000 {
            samples = downsample_2x(&samples);
        }
        Ok(encode_mulaw(&samples))
    }

    // =========================================================================
    // Timers and teardown
    // =========================================================================

    /// When the response watchdog should be checked next.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        if self.is_closing() {
            return None;
        }
        self.turn.watchdog_deadline()
    }

    /// Re-issue a presumed-dropped response request, at most once per request.
    pub async fn on_watchdog(&mut self) {
        if self.is_closing() {
            return;
        }
        if self.turn.on_watchdog(Instant::now()) {
            warn!(
                connection_id = %self.connection_id,
                "No audio since response request, re-issuing once"
            );
            self.send_voice(ClientEvent::response_create("", response_modalities()))
                .await;
        }
    }

    /// Heartbeat both legs.
    pub async fn send_keepalive(&mut self) {
        if self.is_closing() {
            return;
        }
        trace!(connection_id = %self.connection_id, "Keepalive ping");
        let _ = self.voice_tx.send(VoiceRoute::Ping(Bytes::new())).await;
        let _ = self
            .telephony_tx
            .send(TelephonyRoute::Ping(Bytes::new()))
            .await;
    }

    /// Close both legs. Idempotent.
    pub async fn close(&mut self) {
        if self.is_closing() {
            return;
        }
        self.state = SessionState::Closing;
        let _ = self.voice_tx.send(VoiceRoute::Close).await;
        let _ = self.telephony_tx.send(TelephonyRoute::Close).await;
    }

    /// Record that both legs are gone.
    pub fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
        info!(
            connection_id = %self.connection_id,
            stream_sid = ?self.stream_sid,
            frames_in = self.stats.frames_in,
            frames_out = self.stats.frames_out,
            flushes = self.stats.flushes,
            dropped_frames = self.stats.dropped_frames,
            suppressed_requests = self.turn.suppressed(),
            "Session closed"
        );
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn request_response(&mut self, instructions: &str) {
        if self.turn.request_response(Instant::now()) {
            self.send_voice(ClientEvent::response_create(
                instructions,
                response_modalities(),
            ))
            .await;
        } else {
            debug!(
                connection_id = %self.connection_id,
                "Response already in flight, request dropped"
            );
        }
    }

    async fn send_voice(&self, event: ClientEvent) {
        let event_type = event.event_type();
        if self.voice_tx.send(VoiceRoute::Event(event)).await.is_err() {
            debug!(
                connection_id = %self.connection_id,
                "Voice writer gone, dropping {}", event_type
            );
        }
    }

    async fn send_telephony(&self, message: TelephonyOutgoing) {
        if self
            .telephony_tx
            .send(TelephonyRoute::Outgoing(message))
            .await
            .is_err()
        {
            debug!(connection_id = %self.connection_id, "Telephony writer gone");
        }
    }

    fn drop_frame(&mut self, reason: &str) {
        self.stats.dropped_frames += 1;
        warn!(connection_id = %self.connection_id, "Dropping audio frame: {}", reason);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection_id", &self.connection_id)
            .field("stream_sid", &self.stream_sid)
            .field("state", &self.state)
            .field("turn", &self.turn.state())
            .field("buffered_samples", &self.buffer.sample_count())
            .finish()
    }
}
