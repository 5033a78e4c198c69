//! Pub/sub backplane configuration.

use serde::{Deserialize, Serialize};

/// Backplane broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackplaneConfig {
    /// Redis URL for the shared broker.
    #[serde(default = "default_url")]
    pub url: String,
    /// Initial reconnect backoff in milliseconds.
    #[serde(default = "default_backoff_initial")]
    pub backoff_initial_ms: u64,
    /// Maximum reconnect backoff in milliseconds.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    /// Buffer size of the subscriber delivery channel.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for BackplaneConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            backoff_initial_ms: default_backoff_initial(),
            backoff_max_ms: default_backoff_max(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_backoff_initial() -> u64 {
    200
}

fn default_backoff_max() -> u64 {
    10_000
}

fn default_subscriber_buffer() -> usize {
    1024
}
