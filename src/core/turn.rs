//! Turn-taking state machine.
//!
//! The Voice Transport rejects a `response.create` while another response is
//! still in flight, and the rejection aborts the newer request. The
//! coordinator keeps at most one request outstanding per session: while the AI
//! is speaking, further requests are dropped (not queued).
//!
//! ```text
//!            request_response()            response done / error
//!   Idle ──────────────────────────▶ AiSpeaking ───────────────────────▶ Idle
//!                                      │    ▲
//!                                      └────┘ request_response() is a no-op
//! ```
//!
//! The coordinator never talks to a socket. It answers "should I send?" and
//! the session performs the send.

use std::fmt;

use tokio::time::{Duration, Instant};

/// Turn state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// A new response may be requested
    #[default]
    Idle,
    /// One response is outstanding
    AiSpeaking,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::AiSpeaking => write!(f, "ai_speaking"),
        }
    }
}

/// Gatekeeper for `response.create` requests.
#[derive(Debug)]
pub struct TurnCoordinator {
    state: TurnState,
    /// When the outstanding request was issued
    requested_at: Option<Instant>,
    /// Whether any audio arrived for the outstanding request
    audio_seen: bool,
    /// Silence window after which a dropped response is assumed
    watchdog: Option<Duration>,
    /// The watchdog re-issues at most once per request
    watchdog_spent: bool,
    /// Requests suppressed because a response was outstanding
    suppressed: u64,
}

impl TurnCoordinator {
    /// Create a coordinator in the `Idle` state.
    ///
    /// `watchdog` enables a single re-issue when no audio arrives within the
    /// given window after a request.
    pub fn new(watchdog: Option<Duration>) -> Self {
        Self {
            state: TurnState::Idle,
            requested_at: None,
            audio_seen: false,
            watchdog,
            watchdog_spent: false,
            suppressed: 0,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TurnState::Idle
    }

    /// Outstanding response requests: always 0 or 1.
    pub fn outstanding(&self) -> usize {
        match self.state {
            TurnState::Idle => 0,
            TurnState::AiSpeaking => 1,
        }
    }

    /// Requests dropped while a response was outstanding.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Ask to start a new response.
    ///
    /// Returns `true` when the caller must send `response.create`; the
    /// coordinator has moved to `AiSpeaking`. Returns `false` when a response
    /// is already outstanding and the request was dropped.
    pub fn request_response(&mut self, now: Instant) -> bool {
        match self.state {
            TurnState::Idle => {
                self.begin_turn(now);
                true
            }
            TurnState::AiSpeaking => {
                self.suppressed += 1;
                false
            }
        }
    }

    /// The Voice Transport acknowledged a response, or started one on its
    /// own (server-side VAD).
    ///
    /// An acknowledged response was not dropped, so the watchdog is disarmed
    /// for it.
    pub fn on_response_created(&mut self, now: Instant) {
        if self.state == TurnState::Idle {
            self.begin_turn(now);
        }
        self.watchdog_spent = true;
    }

    /// An audio delta arrived for the current response.
    pub fn on_audio_delta(&mut self) {
        self.audio_seen = true;
    }

    /// The current response completed. Returns whether a turn was outstanding.
    pub fn on_response_done(&mut self) -> bool {
        let was_speaking = self.state == TurnState::AiSpeaking;
        self.end_turn();
        was_speaking
    }

    /// The Voice Transport reported an error; recover to `Idle`.
    pub fn on_error(&mut self) {
        self.end_turn();
    }

    /// When the watchdog should fire, if it is armed.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        let window = self.watchdog?;
        if self.state != TurnState::AiSpeaking || self.audio_seen || self.watchdog_spent {
            return None;
        }
        self.requested_at.map(|at| at + window)
    }

    /// Check the watchdog at `now`.
    ///
    /// Returns `true` exactly once per request when no audio has arrived
    /// within the window; the caller re-sends an empty `response.create`. The
    /// re-issue replaces the presumed-dropped request, so the outstanding
    /// count stays at one.
    pub fn on_watchdog(&mut self, now: Instant) -> bool {
        match self.watchdog_deadline() {
            Some(deadline) if now >= deadline => {
                self.watchdog_spent = true;
                self.requested_at = Some(now);
                true
            }
            _ => false,
        }
    }

    fn begin_turn(&mut self, now: Instant) {
        self.state = TurnState::AiSpeaking;
        self.requested_at = Some(now);
        self.audio_seen = false;
        self.watchdog_spent = false;
    }

    fn end_turn(&mut self) {
        self.state = TurnState::Idle;
        self.requested_at = None;
        self.audio_seen = false;
        self.watchdog_spent = false;
    }
}

impl Default for TurnCoordinator {
    fn default() -> Self {
        Self::new(None)
    }
}
