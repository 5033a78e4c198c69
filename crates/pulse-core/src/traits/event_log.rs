//! The durable event log seam.

use async_trait::async_trait;

use crate::result::AppResult;

/// One entry read from an upstream log stream.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// The stream the entry came from.
    pub stream: String,
    /// Broker-assigned entry id; stable across redeliveries.
    pub entry_id: String,
    /// The raw payload.
    pub payload: String,
}

impl LogEntry {
    /// De-duplication key for this entry. Redelivery of the same entry
    /// produces the same key, which is what makes at-least-once safe.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.stream, self.entry_id)
    }
}

/// Appends records to a downstream topic.
#[async_trait]
pub trait EventLogProducer: Send + Sync + std::fmt::Debug {
    /// Append a payload to the named stream.
    async fn append(&self, stream: &str, payload: &str) -> AppResult<()>;
}

/// Consumer-group reader over the upstream topics.
///
/// Exactly one consumer in the group processes a given entry at a time;
/// unacked entries are redelivered, so callers ack only after the
/// corresponding registry mutation has been applied.
#[async_trait]
pub trait EventLogConsumer: Send + Sync + std::fmt::Debug {
    /// Read the next batch, blocking up to the implementation's poll
    /// timeout. An empty batch is a normal idle result.
    async fn read_batch(&self) -> AppResult<Vec<LogEntry>>;

    /// Acknowledge a processed entry.
    async fn ack(&self, stream: &str, entry_id: &str) -> AppResult<()>;
}
