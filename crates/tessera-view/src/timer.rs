//! Deadline-based timers driven by the host's frame tick.
//!
//! Nothing here sleeps. Entries fire when [`TimerQueue::due`] is called
//! with a `now` at or past their deadline, so a disposed owner simply stops
//! ticking and cancels what is left.

use std::time::Instant;

/// Pending timers keyed by `K`; one entry per key.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    entries: Vec<(K, Instant)>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: Copy + PartialEq> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` for `deadline`, replacing any pending entry for it.
    pub fn schedule(&mut self, key: K, deadline: Instant) {
        self.cancel(key);
        self.entries.push((key, deadline));
    }

    /// Drop the entry for `key`. Returns whether one was pending.
    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        before != self.entries.len()
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(_, d)| *d).min()
    }

    /// Remove and return every key whose deadline has passed, earliest first.
    pub fn due(&mut self, now: Instant) -> Vec<K> {
        let mut fired: Vec<(K, Instant)> = Vec::new();
        self.entries.retain(|&(k, d)| {
            if d <= now {
                fired.push((k, d));
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|&(_, d)| d);
        fired.into_iter().map(|(k, _)| k).collect()
    }
}
