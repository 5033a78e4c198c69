//! In-memory pub/sub for single-node deployments and tests.

use tokio::sync::{RwLock, mpsc};
use tracing::warn;

use async_trait::async_trait;

use pulse_core::result::AppResult;
use pulse_core::traits::backplane::{Backplane, BackplaneMessage, BackplaneStream, Subscription};

/// In-memory pub/sub implementation.
///
/// Every published message is delivered to every matching subscriber,
/// including subscribers on the publishing side. This is the same
/// loopback behavior the Redis backplane has, and the heartbeat echo
/// check relies on it.
#[derive(Debug)]
pub struct MemoryBackplane {
    /// Registered subscribers with their subscriptions.
    subscribers: RwLock<Vec<(Subscription, mpsc::Sender<BackplaneMessage>)>>,
    /// Buffer size per subscriber channel.
    buffer_size: usize,
}

impl MemoryBackplane {
    /// Create a new in-memory backplane.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            buffer_size,
        }
    }
}

#[async_trait]
impl Backplane for MemoryBackplane {
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|(_, tx)| !tx.is_closed());

        for (subscription, tx) in subscribers.iter() {
            if !subscription.matches(channel) {
                continue;
            }
            let message = BackplaneMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
            };
            if tx.try_send(message).is_err() {
                warn!(channel, "Subscriber buffer full, dropping message");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, subscription: Subscription) -> AppResult<BackplaneStream> {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        self.subscribers.write().await.push((subscription, tx));
        Ok(rx)
    }
}
