//! In-memory event log for single-node deployments and tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use pulse_core::result::AppResult;
use pulse_core::traits::event_log::{EventLogConsumer, EventLogProducer, LogEntry};

/// In-process event log implementing both the producer and consumer
/// seams. Appended entries are queued for the consumer and kept in an
/// inspection buffer so tests can assert on publications.
#[derive(Debug)]
pub struct MemoryEventLog {
    /// Entries waiting for the consumer.
    queue: Mutex<VecDeque<LogEntry>>,
    /// Everything ever appended, in order.
    appended: Mutex<Vec<LogEntry>>,
    /// Acked entry keys, in order.
    acked: Mutex<Vec<String>>,
    /// Wakes a blocked `read_batch`.
    notify: Notify,
    /// Monotonic entry id source.
    seq: AtomicU64,
    /// Read block timeout.
    block: Duration,
    /// Max entries per batch.
    batch_size: usize,
}

impl MemoryEventLog {
    /// Create a log with the given poll timeout and batch size.
    pub fn new(block: Duration, batch_size: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            appended: Mutex::new(Vec::new()),
            acked: Mutex::new(Vec::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            block,
            batch_size,
        }
    }

    /// Payloads appended to a stream, in order.
    pub fn appended_to(&self, stream: &str) -> Vec<String> {
        self.appended
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.stream == stream)
            .map(|entry| entry.payload.clone())
            .collect()
    }

    /// All payloads appended to streams with the given prefix.
    pub fn appended_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.appended
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.stream.starts_with(prefix))
            .map(|entry| entry.payload.clone())
            .collect()
    }

    /// Keys acked so far.
    pub fn acked_keys(&self) -> Vec<String> {
        self.acked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requeue an already-delivered entry, simulating broker redelivery.
    pub fn redeliver(&self, entry: LogEntry) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl EventLogProducer for MemoryEventLog {
    async fn append(&self, stream: &str, payload: &str) -> AppResult<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = LogEntry {
            stream: stream.to_string(),
            entry_id: format!("{seq}-0"),
            payload: payload.to_string(),
        };
        self.appended
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl EventLogConsumer for MemoryEventLog {
    async fn read_batch(&self) -> AppResult<Vec<LogEntry>> {
        loop {
            let notified = self.notify.notified();
            {
                let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
                if !queue.is_empty() {
                    let take = queue.len().min(self.batch_size);
                    return Ok(queue.drain(..take).collect());
                }
            }
            if tokio::time::timeout(self.block, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream: &str, entry_id: &str) -> AppResult<()> {
        self.acked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{stream}:{entry_id}"));
        Ok(())
    }
}
