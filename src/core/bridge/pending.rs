//! Bounded holding area for Telephony messages that arrive before the Voice
//! Transport is ready.
//!
//! Not subject to the turn-taking threshold: everything held here is replayed
//! in arrival order as soon as the session starts.

use std::collections::VecDeque;

/// FIFO of raw Telephony text messages.
///
/// When full, newer messages are dropped so the early `start` event survives.
#[derive(Debug)]
pub struct PendingQueue {
    messages: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Hold a message. Returns `false` if the queue was full and it was dropped.
    pub fn push(&mut self, message: String) -> bool {
        if self.messages.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.messages.push_back(message);
        true
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Take all held messages in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.messages.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_in_arrival_order() {
        let mut queue = PendingQueue::new(8);
        queue.push("start".to_string());
        queue.push("media-1".to_string());
        queue.push("media-2".to_string());

        let drained: Vec<String> = queue.drain().collect();
        assert_eq!(drained, vec!["start", "media-1", "media-2"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_keeps_oldest() {
        let mut queue = PendingQueue::new(2);
        assert!(queue.push("start".to_string()));
        assert!(queue.push("media-1".to_string()));
        assert!(!queue.push("media-2".to_string()));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.drain().next().as_deref(), Some("start"));
    }
}
