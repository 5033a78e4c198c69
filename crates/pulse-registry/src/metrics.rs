//! Presence pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters across the presence pipeline, exposed on the readiness
/// surface. Plain atomics; there is no external metrics backend.
#[derive(Debug, Default)]
pub struct PresenceMetrics {
    /// Transitions applied (any origin).
    events_applied: AtomicU64,
    /// Replays suppressed by the de-duplication window.
    duplicates_suppressed: AtomicU64,
    /// Externally observable transitions published downstream.
    transitions_published: AtomicU64,
    /// Unparseable upstream messages skipped.
    malformed_events: AtomicU64,
    /// Records evicted by the maintenance sweep.
    records_evicted: AtomicU64,
}

impl PresenceMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied transition.
    pub fn record_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a suppressed replay.
    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a downstream publication.
    pub fn record_published(&self) {
        self.transitions_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed upstream message.
    pub fn record_malformed(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record evicted records.
    pub fn record_evicted(&self, count: u64) {
        self.records_evicted.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time view.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            transitions_published: self.transitions_published.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            records_evicted: self.records_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`PresenceMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Transitions applied.
    pub events_applied: u64,
    /// Replays suppressed.
    pub duplicates_suppressed: u64,
    /// Downstream publications.
    pub transitions_published: u64,
    /// Malformed upstream messages.
    pub malformed_events: u64,
    /// Evicted records.
    pub records_evicted: u64,
}
