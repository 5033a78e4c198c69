//! Shared health state reported on the readiness surface.
//!
//! Degraded states (backplane loss, cluster partition, consumer lag) are
//! warnings, not failures: the node keeps serving locally-known presence
//! and the platform's health checks decide how to weigh the flags.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Mutable health flags updated by the transport tasks.
#[derive(Debug)]
pub struct HealthState {
    /// Whether the backplane connection is currently established.
    backplane_connected: AtomicBool,
    /// Whether this node is cut off from cluster heartbeats.
    cluster_partitioned: AtomicBool,
    /// Unix millis of the last successful upstream log read.
    last_ingest_ms: AtomicI64,
    /// Entries read but not yet acknowledged at the last poll.
    ingest_pending: AtomicU64,
}

impl HealthState {
    /// Create a fresh health state; backplane starts disconnected until
    /// the subscriber task reports in.
    pub fn new() -> Self {
        Self {
            backplane_connected: AtomicBool::new(false),
            cluster_partitioned: AtomicBool::new(false),
            last_ingest_ms: AtomicI64::new(0),
            ingest_pending: AtomicU64::new(0),
        }
    }

    /// Record backplane connectivity.
    pub fn set_backplane_connected(&self, connected: bool) {
        self.backplane_connected.store(connected, Ordering::Relaxed);
    }

    /// Record cluster partition state.
    pub fn set_cluster_partitioned(&self, partitioned: bool) {
        self.cluster_partitioned
            .store(partitioned, Ordering::Relaxed);
    }

    /// Record a successful upstream read with its pending count.
    pub fn record_ingest(&self, at: DateTime<Utc>, pending: u64) {
        self.last_ingest_ms
            .store(at.timestamp_millis(), Ordering::Relaxed);
        self.ingest_pending.store(pending, Ordering::Relaxed);
    }

    /// Whether the backplane is connected.
    pub fn backplane_connected(&self) -> bool {
        self.backplane_connected.load(Ordering::Relaxed)
    }

    /// Whether this node considers itself partitioned.
    pub fn cluster_partitioned(&self) -> bool {
        self.cluster_partitioned.load(Ordering::Relaxed)
    }

    /// Point-in-time view for the readiness endpoint.
    pub fn snapshot(&self) -> HealthSnapshot {
        let last_ms = self.last_ingest_ms.load(Ordering::Relaxed);
        let last_ingest_at = (last_ms > 0)
            .then(|| Utc.timestamp_millis_opt(last_ms).single())
            .flatten();
        HealthSnapshot {
            backplane_connected: self.backplane_connected(),
            cluster_partitioned: self.cluster_partitioned(),
            last_ingest_at,
            ingest_pending: self.ingest_pending.load(Ordering::Relaxed),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of [`HealthState`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Backplane connectivity.
    pub backplane_connected: bool,
    /// Cluster partition flag.
    pub cluster_partitioned: bool,
    /// Last successful upstream log read, if any.
    pub last_ingest_at: Option<DateTime<Utc>>,
    /// Upstream entries pending acknowledgement at the last poll.
    pub ingest_pending: u64,
}
