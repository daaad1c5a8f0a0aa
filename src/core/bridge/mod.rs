//! Call bridging: the per-call Session and the Session Manager that creates it.

mod keepalive;
mod manager;
mod pending;
mod session;

pub use keepalive::Keepalive;
pub use manager::run_call;
pub use pending::PendingQueue;
pub use session::{Session, SessionState, SessionStats, TelephonyRoute, VoiceRoute};
