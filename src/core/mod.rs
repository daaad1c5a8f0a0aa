pub mod bridge;
pub mod buffer;
pub mod codec;
pub mod realtime;
pub mod telephony;
pub mod turn;

pub use buffer::AudioBuffer;
pub use codec::{AudioEncoding, AudioFrame, CodecError, CodecResult, SampleRate};
pub use turn::{TurnCoordinator, TurnState};
