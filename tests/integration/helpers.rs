//! Shared fixtures: an in-process Pulse node wired to shared in-memory
//! transports, standing in for one server process of the cluster.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use pulse_backplane::MemoryBackplane;
use pulse_bridge::MemoryEventLog;
use pulse_bridge::dispatch::{node_subscription, run_backplane_dispatcher};
use pulse_bridge::ingest::run_ingest;
use pulse_cluster::membership::Membership;
use pulse_core::config::event_log::EventLogConfig;
use pulse_core::config::presence::PresenceConfig;
use pulse_core::events::presence::PresenceEvent;
use pulse_core::health::HealthState;
use pulse_core::traits::backplane::Backplane;
use pulse_core::traits::event_log::{EventLogConsumer, EventLogProducer};
use pulse_core::traits::fanout::FanoutSink;
use pulse_core::types::id::NodeId;
use pulse_registry::reaper::{reaper_channel, run_reaper};
use pulse_registry::registry::PresenceRegistry;
use pulse_registry::service::PresenceService;

/// Records everything delivered to this node's local clients.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<PresenceEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PresenceEvent> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl FanoutSink for RecordingSink {
    async fn deliver(&self, event: &PresenceEvent) {
        self.delivered.lock().unwrap().push(event.clone());
    }
}

/// One simulated cluster node.
pub struct TestNode {
    pub service: Arc<PresenceService>,
    pub membership: Arc<Membership>,
    pub health: Arc<HealthState>,
    pub sink: Arc<RecordingSink>,
    shutdown: watch::Sender<()>,
}

impl TestNode {
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Shared transports for a simulated cluster.
pub struct TestCluster {
    pub backplane: Arc<MemoryBackplane>,
    pub upstream: Arc<MemoryEventLog>,
    pub downstream: Arc<MemoryEventLog>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self {
            backplane: Arc::new(MemoryBackplane::new(256)),
            upstream: Arc::new(MemoryEventLog::new(Duration::from_millis(100), 16)),
            downstream: Arc::new(MemoryEventLog::new(Duration::from_millis(100), 16)),
        }
    }

    /// Payloads published to the downstream presence topic, any partition.
    pub fn published(&self) -> Vec<String> {
        self.downstream.appended_with_prefix("presence-events:")
    }

    /// Statuses published downstream, in order.
    pub fn published_statuses(&self) -> Vec<String> {
        self.published()
            .iter()
            .map(|payload| {
                let value: serde_json::Value = serde_json::from_str(payload).unwrap();
                value["status"].as_str().unwrap().to_string()
            })
            .collect()
    }

    /// Spawn a node with background dispatch, ingestion, and reaper.
    pub async fn spawn_node(&self, name: &str, grace: Duration) -> TestNode {
        let membership = Arc::new(Membership::new(
            NodeId::new(name),
            Duration::from_secs(5),
            3,
        ));
        let health = Arc::new(HealthState::new());
        let sink = Arc::new(RecordingSink::default());

        let registry = PresenceRegistry::new(membership.clone(), &PresenceConfig::default());
        let (reaper_handle, reaper_rx) = reaper_channel();
        let service = Arc::new(PresenceService::new(
            registry,
            self.backplane.clone() as Arc<dyn Backplane>,
            self.downstream.clone() as Arc<dyn EventLogProducer>,
            sink.clone() as Arc<dyn FanoutSink>,
            membership.clone(),
            reaper_handle,
            EventLogConfig::default(),
        ));

        let (shutdown, shutdown_rx) = watch::channel(());

        tokio::spawn(run_reaper(
            reaper_rx,
            service.clone(),
            grace,
            shutdown_rx.clone(),
        ));
        let stream = self
            .backplane
            .subscribe(node_subscription())
            .await
            .expect("subscribe");
        tokio::spawn(run_backplane_dispatcher(
            stream,
            service.clone(),
            shutdown_rx.clone(),
        ));
        tokio::spawn(run_ingest(
            self.upstream.clone() as Arc<dyn EventLogConsumer>,
            service.clone(),
            health.clone(),
            shutdown_rx,
        ));

        TestNode {
            service,
            membership,
            health,
            sink,
            shutdown,
        }
    }
}

/// Let spawned tasks drain their queues; with the paused clock this
/// costs no wall time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}
