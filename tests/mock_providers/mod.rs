//! Mock provider servers for integration tests.
//!
//! Simulates the Voice Transport over a local WebSocket so calls can be
//! bridged end to end without network access.

pub mod voice_mock;

pub use voice_mock::{MockVoiceOptions, MockVoiceServer, RecordedHandshake};
