//! Durable event log configuration.

use serde::{Deserialize, Serialize};

/// Settings for the upstream/downstream event log (Redis Streams).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Redis URL for the event log; usually the backplane broker.
    #[serde(default = "default_url")]
    pub url: String,
    /// Upstream streams consumed into the registry.
    #[serde(default = "default_consume_streams")]
    pub consume_streams: Vec<String>,
    /// Downstream stream prefix; one partition per suffix.
    #[serde(default = "default_publish_stream")]
    pub publish_stream: String,
    /// Number of partitions for the downstream stream.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Consumer group name; one group shared by the whole cluster.
    #[serde(default = "default_group")]
    pub group: String,
    /// Entries read per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Poll block timeout in milliseconds.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    /// Readiness warns when no successful read happened for this long.
    #[serde(default = "default_lag_warn")]
    pub lag_warn_seconds: u64,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            consume_streams: default_consume_streams(),
            publish_stream: default_publish_stream(),
            partitions: default_partitions(),
            group: default_group(),
            batch_size: default_batch_size(),
            block_ms: default_block_ms(),
            lag_warn_seconds: default_lag_warn(),
        }
    }
}

impl EventLogConfig {
    /// The downstream partition stream for a user-id hash.
    pub fn partition_stream(&self, partition: u32) -> String {
        format!("{}:{}", self.publish_stream, partition)
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_consume_streams() -> Vec<String> {
    vec!["user-events".to_string(), "connection-events".to_string()]
}

fn default_publish_stream() -> String {
    "presence-events".to_string()
}

fn default_partitions() -> u32 {
    16
}

fn default_group() -> String {
    "pulse-presence".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_block_ms() -> u64 {
    5_000
}

fn default_lag_warn() -> u64 {
    30
}
