//! Local presence fanout: transitions → locally-attached subscribers.

use std::sync::Arc;

use async_trait::async_trait;

use pulse_core::events::presence::PresenceEvent;
use pulse_core::traits::fanout::FanoutSink;

use crate::channels::SubscriptionRegistry;
use crate::frames::OutboundFrame;
use crate::metrics::GatewayMetrics;
use crate::pool::ConnectionPool;

/// Delivers presence transitions to this node's subscribed connections.
///
/// Stands between the presence service and the connection manager so the
/// two can be constructed without referencing each other.
#[derive(Debug)]
pub struct LocalFanout {
    /// Connection pool.
    pool: Arc<ConnectionPool>,
    /// Channel subscriptions.
    subscriptions: Arc<SubscriptionRegistry>,
    /// Delivery counters.
    metrics: Arc<GatewayMetrics>,
}

impl LocalFanout {
    /// Create a fanout over the given pool and subscriptions.
    pub fn new(
        pool: Arc<ConnectionPool>,
        subscriptions: Arc<SubscriptionRegistry>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            pool,
            subscriptions,
            metrics,
        }
    }
}

#[async_trait]
impl FanoutSink for LocalFanout {
    async fn deliver(&self, event: &PresenceEvent) {
        let subscribers = self.subscriptions.subscribers(&event.channel());
        if subscribers.is_empty() {
            return;
        }
        // Serialize once per event, not per subscriber.
        let frame = OutboundFrame::presence(event).to_json();
        let mut delivered = 0u64;
        for conn_id in subscribers {
            if let Some(handle) = self.pool.get(&conn_id) {
                if handle.send(frame.clone()) {
                    delivered += 1;
                }
            }
        }
        self.metrics.record_frames_delivered(delivered);
    }
}
