//! Session heartbeat timer.
//!
//! Acquired when the session becomes active and released by dropping it; the
//! manager holds it in the session loop's scope so every exit path cancels it.

use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tracing::debug;

/// Periodic heartbeat tick for one session.
#[derive(Debug)]
pub struct Keepalive {
    interval: Interval,
}

impl Keepalive {
    /// Start ticking; the first tick fires one `period` from now.
    pub fn start(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next heartbeat.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        debug!("Keepalive cancelled");
    }
}
