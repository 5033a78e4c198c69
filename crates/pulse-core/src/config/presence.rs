//! Presence registry configuration.

use serde::{Deserialize, Serialize};

/// Registry, grace window, and de-duplication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Grace window after the last local disconnect before a user is
    /// demoted to offline.
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,
    /// How long a correlation id is remembered for de-duplication.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_seconds: u64,
    /// Number of registry shards; sharded by user-id hash.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
    /// Upper bound on resident presence records; offline records are
    /// evicted oldest-first beyond this.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Interval of the maintenance sweep (eviction + dead-node check).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: default_grace_period(),
            dedup_window_seconds: default_dedup_window(),
            shard_count: default_shard_count(),
            max_records: default_max_records(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_grace_period() -> u64 {
    30
}

fn default_dedup_window() -> u64 {
    120
}

fn default_shard_count() -> usize {
    64
}

fn default_max_records() -> usize {
    100_000
}

fn default_sweep_interval() -> u64 {
    5
}
