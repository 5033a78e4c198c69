//! Connection manager — lifecycle and inbound frame routing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pulse_core::config::gateway::GatewayConfig;
use pulse_core::events::presence::presence_channel;
use pulse_registry::service::PresenceService;

use crate::authenticator::AcceptedConnection;
use crate::channels::SubscriptionRegistry;
use crate::frames::{InboundFrame, OutboundFrame};
use crate::handle::{ConnectionHandle, ConnectionId};
use crate::metrics::GatewayMetrics;
use crate::pool::ConnectionPool;

/// Manages all active WebSocket connections on this node.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Connection pool.
    pool: Arc<ConnectionPool>,
    /// Channel subscriptions.
    subscriptions: Arc<SubscriptionRegistry>,
    /// Presence service; registration and status updates go through it.
    service: Arc<PresenceService>,
    /// Gateway settings.
    config: GatewayConfig,
    /// Counters.
    metrics: Arc<GatewayMetrics>,
}

impl ConnectionManager {
    /// Creates a connection manager.
    pub fn new(
        pool: Arc<ConnectionPool>,
        subscriptions: Arc<SubscriptionRegistry>,
        service: Arc<PresenceService>,
        config: GatewayConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            pool,
            subscriptions,
            service,
            config,
            metrics,
        }
    }

    /// The gateway counters.
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// The presence service behind this manager.
    pub fn service(&self) -> &Arc<PresenceService> {
        &self.service
    }

    /// Registers an accepted connection.
    ///
    /// Returns the handle and the receiver feeding the socket writer.
    pub async fn register(
        &self,
        accepted: AcceptedConnection,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        // Per-user cap: the oldest connection makes room for the newest.
        let existing = self.pool.user_connections(&accepted.user_id);
        if existing.len() >= self.config.max_connections_per_user {
            if let Some(oldest) = existing.first() {
                warn!(
                    user_id = %accepted.user_id,
                    count = existing.len(),
                    max = self.config.max_connections_per_user,
                    "User at max connections, closing oldest"
                );
                self.unregister(&oldest.id).await;
            }
        }

        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(accepted.user_id.clone(), tx));
        self.pool.add(handle.clone());

        // Every connection watches its own presence plus the connect
        // request's observed users.
        self.subscriptions
            .subscribe(&presence_channel(&accepted.user_id), handle.id);
        for watched in accepted
            .watch
            .iter()
            .take(self.config.max_subscriptions_per_connection.saturating_sub(1))
        {
            self.subscriptions
                .subscribe(&presence_channel(watched), handle.id);
        }

        self.service.connect_local(accepted.user_id.clone()).await;
        self.metrics.record_connection_opened();

        info!(
            conn_id = %handle.id,
            user_id = %accepted.user_id,
            "WebSocket connection registered"
        );

        (handle, rx)
    }

    /// Unregisters a connection and cleans up subscriptions.
    pub async fn unregister(&self, conn_id: &ConnectionId) {
        let Some(handle) = self.pool.remove(conn_id) else {
            return;
        };
        handle.mark_closed();
        self.subscriptions.unsubscribe_all(*conn_id);
        self.metrics.record_connection_closed();

        // Presence only reacts when the user's last local connection is
        // gone; the service then starts the grace window.
        if !self.pool.user_connected(&handle.user_id) {
            self.service.disconnect_local(handle.user_id.clone()).await;
        }

        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            "WebSocket connection unregistered"
        );
    }

    /// Processes an inbound frame from a client.
    pub async fn handle_frame(&self, conn_id: &ConnectionId, raw: &str) {
        let Some(handle) = self.pool.get(conn_id) else {
            warn!(conn_id = %conn_id, "Frame from unknown connection");
            return;
        };

        let frame: InboundFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                handle.send(
                    OutboundFrame::Error {
                        code: "INVALID_FRAME".to_string(),
                        message: format!("Failed to parse frame: {e}"),
                    }
                    .to_json(),
                );
                return;
            }
        };

        match frame {
            InboundFrame::Subscribe { channel } => {
                self.handle_subscribe(&handle, &channel);
            }
            InboundFrame::Unsubscribe { channel } => {
                self.subscriptions.unsubscribe(&channel, handle.id);
                debug!(conn_id = %conn_id, channel, "Unsubscribed");
            }
            InboundFrame::Status { status } => {
                self.service
                    .update_status_local(handle.user_id.clone(), status)
                    .await;
            }
            InboundFrame::Ping => {
                handle.send(
                    OutboundFrame::Pong {
                        timestamp: chrono::Utc::now(),
                    }
                    .to_json(),
                );
            }
            InboundFrame::Pong => {
                handle.record_pong().await;
            }
        }

        self.metrics.record_frame_received();
    }

    /// Handles a subscribe request with limit and shape checks.
    fn handle_subscribe(&self, handle: &ConnectionHandle, channel: &str) {
        if self.subscriptions.subscription_count(handle.id)
            >= self.config.max_subscriptions_per_connection
        {
            handle.send(
                OutboundFrame::Error {
                    code: "MAX_SUBSCRIPTIONS".to_string(),
                    message: format!(
                        "Maximum subscriptions ({}) reached",
                        self.config.max_subscriptions_per_connection
                    ),
                }
                .to_json(),
            );
            return;
        }

        // Only presence channels exist on this surface.
        if !channel.starts_with("presence:") {
            handle.send(
                OutboundFrame::Error {
                    code: "FORBIDDEN".to_string(),
                    message: format!("Unknown channel: {channel}"),
                }
                .to_json(),
            );
            return;
        }

        self.subscriptions.subscribe(channel, handle.id);
        handle.send(
            OutboundFrame::Subscribed {
                channel: channel.to_string(),
            }
            .to_json(),
        );
        debug!(conn_id = %handle.id, channel, "Subscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use pulse_cluster::membership::Membership;
    use pulse_core::AppResult;
    use pulse_core::config::event_log::EventLogConfig;
    use pulse_core::config::presence::PresenceConfig;
    use pulse_core::events::presence::{PresenceEvent, PresenceStatus};
    use pulse_core::traits::backplane::{Backplane, BackplaneStream, Subscription};
    use pulse_core::traits::event_log::EventLogProducer;
    use pulse_core::traits::fanout::FanoutSink;
    use pulse_core::types::id::{NodeId, UserId};
    use pulse_registry::reaper::reaper_channel;
    use pulse_registry::registry::PresenceRegistry;

    use crate::authenticator::AcceptedConnection;

    #[derive(Debug, Default)]
    struct NullBackplane;

    #[async_trait]
    impl Backplane for NullBackplane {
        async fn publish(&self, _channel: &str, _payload: &str) -> AppResult<()> {
            Ok(())
        }

        async fn subscribe(&self, _subscription: Subscription) -> AppResult<BackplaneStream> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }
    }

    #[derive(Debug, Default)]
    struct NullProducer;

    #[async_trait]
    impl EventLogProducer for NullProducer {
        async fn append(&self, _stream: &str, _payload: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct NullSink {
        delivered: Mutex<Vec<PresenceEvent>>,
    }

    #[async_trait]
    impl FanoutSink for NullSink {
        async fn deliver(&self, event: &PresenceEvent) {
            self.delivered.lock().unwrap().push(event.clone());
        }
    }

    fn manager(config: GatewayConfig) -> ConnectionManager {
        let membership = Arc::new(Membership::new(
            NodeId::new("node-a"),
            Duration::from_secs(5),
            3,
        ));
        let registry = PresenceRegistry::new(membership.clone(), &PresenceConfig::default());
        let (reaper, _rx) = reaper_channel();
        let service = Arc::new(PresenceService::new(
            registry,
            Arc::new(NullBackplane),
            Arc::new(NullProducer),
            Arc::new(NullSink::default()),
            membership,
            reaper,
            EventLogConfig::default(),
        ));
        ConnectionManager::new(
            Arc::new(ConnectionPool::new()),
            Arc::new(SubscriptionRegistry::new()),
            service,
            config,
            Arc::new(GatewayMetrics::new()),
        )
    }

    fn accepted(user: &str) -> AcceptedConnection {
        AcceptedConnection {
            user_id: UserId::new(user),
            watch: vec![],
        }
    }

    #[tokio::test]
    async fn test_connection_cap_closes_oldest() {
        let manager = manager(GatewayConfig {
            max_connections_per_user: 2,
            ..GatewayConfig::default()
        });

        let (first, _rx1) = manager.register(accepted("u1")).await;
        let (_second, _rx2) = manager.register(accepted("u1")).await;
        let (_third, _rx3) = manager.register(accepted("u1")).await;

        assert!(!first.is_alive());
        assert_eq!(manager.pool.user_connections(&UserId::new("u1")).len(), 2);
        // Presence stayed online throughout the churn.
        assert_eq!(
            manager
                .service
                .get_status(&UserId::new("u1"))
                .expect("record")
                .status,
            PresenceStatus::Online
        );
    }

    #[tokio::test]
    async fn test_unregister_last_connection_enters_grace_not_offline() {
        let manager = manager(GatewayConfig::default());
        let (handle, _rx) = manager.register(accepted("u1")).await;
        manager.unregister(&handle.id).await;

        // The grace window keeps the user online until the reaper fires.
        assert_eq!(
            manager
                .service
                .get_status(&UserId::new("u1"))
                .expect("record")
                .status,
            PresenceStatus::Online
        );
        assert_eq!(manager.pool.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_non_presence_channels() {
        let manager = manager(GatewayConfig::default());
        let (handle, mut rx) = manager.register(accepted("u1")).await;

        manager
            .handle_frame(&handle.id, r#"{"type":"subscribe","channel":"jobs:1"}"#)
            .await;

        let frame = rx.recv().await.expect("error frame");
        assert!(frame.contains("FORBIDDEN"));
        // Only the automatic self subscription remains.
        assert_eq!(manager.subscriptions.subscription_count(handle.id), 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let manager = manager(GatewayConfig::default());
        let (handle, mut rx) = manager.register(accepted("u1")).await;

        manager.handle_frame(&handle.id, "not json").await;
        let frame = rx.recv().await.expect("error frame");
        assert!(frame.contains("INVALID_FRAME"));
    }
}
