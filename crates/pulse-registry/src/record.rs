//! The per-user presence record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use pulse_core::events::presence::PresenceStatus;
use pulse_core::types::id::NodeId;

/// In-memory presence state for one user.
///
/// Created lazily on the first connection or inbound event referencing
/// the user; never deleted inline. Records decay to offline and are
/// evicted by the maintenance sweep once idle.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    /// Current user-level status.
    pub status: PresenceStatus,
    /// Per-node live connection counts, merged additively across nodes.
    pub counts: HashMap<NodeId, u32>,
    /// Node reporting the freshest connection; tie-breaker metadata only.
    pub owner_node_id: Option<NodeId>,
    /// Last heartbeat-ish activity (connect, pong, mirrored event).
    pub last_heartbeat_at: DateTime<Utc>,
    /// Last time the user was seen by any transition.
    pub last_seen_at: DateTime<Utc>,
    /// Demotion epoch: nonzero while a grace timer is pending. Bumped on
    /// every schedule so a stale expiry can be recognized and ignored.
    pub pending_demotion: u64,
}

impl PresenceRecord {
    /// Fresh offline record.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: PresenceStatus::Offline,
            counts: HashMap::new(),
            owner_node_id: None,
            last_heartbeat_at: now,
            last_seen_at: now,
            pending_demotion: 0,
        }
    }

    /// Connection count contributed by one node.
    pub fn node_count(&self, node: &NodeId) -> u32 {
        self.counts.get(node).copied().unwrap_or(0)
    }

    /// Sum of counts over nodes the caller still trusts.
    pub fn effective_count(&self, trusts: impl Fn(&NodeId) -> bool) -> u32 {
        self.counts
            .iter()
            .filter(|(node, _)| trusts(node))
            .map(|(_, count)| count)
            .sum()
    }

    /// Whether the record holds no state worth keeping: offline, no
    /// counts anywhere, no pending grace timer.
    pub fn is_idle(&self) -> bool {
        self.status == PresenceStatus::Offline
            && self.pending_demotion == 0
            && self.counts.values().all(|c| *c == 0)
    }

    /// Record activity for the user.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_seen_at {
            self.last_seen_at = at;
        }
        if at > self.last_heartbeat_at {
            self.last_heartbeat_at = at;
        }
    }
}

impl Default for PresenceRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view served to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceSnapshot {
    /// Current status.
    pub status: PresenceStatus,
    /// Last time the user was seen.
    pub last_seen_at: DateTime<Utc>,
}
