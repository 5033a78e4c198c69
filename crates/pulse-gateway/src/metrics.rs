//! Gateway counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Connection and frame counters for the readiness surface.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Connections opened since start.
    connections_opened: AtomicU64,
    /// Connections closed since start.
    connections_closed: AtomicU64,
    /// Inbound frames handled.
    frames_received: AtomicU64,
    /// Presence frames delivered to clients.
    frames_delivered: AtomicU64,
    /// Rejected connection attempts.
    auth_failures: AtomicU64,
}

impl GatewayMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an opened connection.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed connection.
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handled inbound frame.
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record delivered presence frames.
    pub fn record_frames_delivered(&self, count: u64) {
        self.frames_delivered.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a rejected connection attempt.
    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view.
    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`GatewayMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySnapshot {
    /// Connections opened.
    pub connections_opened: u64,
    /// Connections closed.
    pub connections_closed: u64,
    /// Inbound frames handled.
    pub frames_received: u64,
    /// Presence frames delivered.
    pub frames_delivered: u64,
    /// Rejected connection attempts.
    pub auth_failures: u64,
}
