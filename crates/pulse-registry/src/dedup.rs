//! Short-lived de-duplication window keyed by correlation id.
//!
//! The backplane and the event log are both at-least-once transports;
//! every correlation id is remembered for a bounded window and replays
//! inside it are no-ops. Locally-originated events are recorded at apply
//! time so their own backplane echo is suppressed the same way.

use std::time::Duration;

use moka::sync::Cache;

/// TTL-bounded set of recently seen correlation keys.
pub struct CorrelationWindow {
    /// Key → unit, expiring after the window.
    seen: Cache<String, ()>,
}

impl std::fmt::Debug for CorrelationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationWindow")
            .field("entries", &self.seen.entry_count())
            .finish()
    }
}

impl CorrelationWindow {
    /// Create a window remembering keys for `window` after insertion.
    pub fn new(window: Duration, capacity: u64) -> Self {
        let seen = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(window)
            .build();
        Self { seen }
    }

    /// Record a key; returns `true` if it was fresh, `false` if this is
    /// a replay within the window.
    pub fn observe(&self, key: &str) -> bool {
        if self.seen.contains_key(key) {
            return false;
        }
        self.seen.insert(key.to_string(), ());
        true
    }

    /// Record a key without caring whether it was fresh.
    pub fn record(&self, key: &str) {
        self.seen.insert(key.to_string(), ());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_suppressed() {
        let window = CorrelationWindow::new(Duration::from_secs(60), 1000);
        assert!(window.observe("corr-1"));
        assert!(!window.observe("corr-1"));
        assert!(window.observe("corr-2"));
    }

    #[test]
    fn test_record_marks_seen() {
        let window = CorrelationWindow::new(Duration::from_secs(60), 1000);
        window.record("corr-3");
        assert!(!window.observe("corr-3"));
    }
}
