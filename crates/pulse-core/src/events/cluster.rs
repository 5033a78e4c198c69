//! Cluster heartbeat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::NodeId;

/// Backplane channel carrying node heartbeats.
pub const HEARTBEAT_CHANNEL: &str = "cluster:heartbeat";

/// A node liveness announcement, published periodically on the backplane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    /// The announcing node.
    pub node_id: NodeId,
    /// When the node emitted the heartbeat.
    pub timestamp: DateTime<Utc>,
}

impl Heartbeat {
    /// Build a heartbeat for `node_id` stamped now.
    pub fn now(node_id: NodeId) -> Self {
        Self {
            node_id,
            timestamp: Utc::now(),
        }
    }
}
