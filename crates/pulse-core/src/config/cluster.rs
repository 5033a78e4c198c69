//! Cluster membership configuration.

use serde::{Deserialize, Serialize};

/// Heartbeat and liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Stable node identifier; generated at startup when unset.
    #[serde(default)]
    pub node_id: Option<String>,
    /// Interval between heartbeat announcements in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Consecutive missed intervals after which a node is dead.
    #[serde(default = "default_liveness_misses")]
    pub liveness_misses: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            heartbeat_interval_seconds: default_heartbeat_interval(),
            liveness_misses: default_liveness_misses(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_liveness_misses() -> u32 {
    3
}
