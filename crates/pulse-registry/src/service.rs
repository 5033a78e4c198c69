//! The presence service: registry plus its side-effect channels.
//!
//! [`PresenceRegistry::apply`] is pure state mutation; this layer owns
//! everything that happens afterwards (backplane broadcast, downstream
//! publication, local fanout, grace-timer scheduling), strictly outside
//! the registry locks.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, warn};

use pulse_cluster::membership::Membership;
use pulse_core::config::event_log::EventLogConfig;
use pulse_core::events::log::UpstreamEvent;
use pulse_core::events::presence::{PresenceEvent, PresenceStatus, PublishedPresence};
use pulse_core::traits::backplane::Backplane;
use pulse_core::traits::event_log::EventLogProducer;
use pulse_core::traits::fanout::FanoutSink;
use pulse_core::types::id::{NodeId, UserId};

use crate::metrics::PresenceMetrics;
use crate::reaper::ReaperHandle;
use crate::record::PresenceSnapshot;
use crate::registry::{ApplyOutcome, PresenceRegistry, TimerAction, Transition};

/// Pseudo-node that upstream log events are attributed to when the
/// producer does not say which transport node reported them. Using one
/// shared id keeps attribution consistent no matter which cluster node
/// happens to consume the entry.
pub const UPSTREAM_NODE: &str = "upstream";

/// Presence registry with its side-effect channels.
#[derive(Debug)]
pub struct PresenceService {
    /// The sharded registry.
    registry: PresenceRegistry,
    /// Cross-node fanout.
    backplane: Arc<dyn Backplane>,
    /// Downstream `presence-events` producer.
    producer: Arc<dyn EventLogProducer>,
    /// Delivery to locally-attached clients.
    fanout: Arc<dyn FanoutSink>,
    /// Liveness oracle.
    membership: Arc<Membership>,
    /// Grace timer handle.
    reaper: ReaperHandle,
    /// Pipeline counters.
    metrics: PresenceMetrics,
    /// Downstream partitioning settings.
    event_log: EventLogConfig,
}

impl PresenceService {
    /// Compose a service from its parts.
    pub fn new(
        registry: PresenceRegistry,
        backplane: Arc<dyn Backplane>,
        producer: Arc<dyn EventLogProducer>,
        fanout: Arc<dyn FanoutSink>,
        membership: Arc<Membership>,
        reaper: ReaperHandle,
        event_log: EventLogConfig,
    ) -> Self {
        Self {
            registry,
            backplane,
            producer,
            fanout,
            membership,
            reaper,
            metrics: PresenceMetrics::new(),
            event_log,
        }
    }

    /// Pipeline counters.
    pub fn metrics(&self) -> &PresenceMetrics {
        &self.metrics
    }

    /// The liveness oracle this service consults.
    pub fn membership(&self) -> &Arc<Membership> {
        &self.membership
    }

    /// A gateway connection was registered for `user` on this node.
    pub async fn connect_local(&self, user: UserId) {
        let node = self.registry.node_id().clone();
        let outcome = self.registry.apply(Transition::Connect { user, node });
        self.commit_local(outcome).await;
    }

    /// A gateway connection for `user` on this node closed.
    pub async fn disconnect_local(&self, user: UserId) {
        let node = self.registry.node_id().clone();
        let outcome = self.registry.apply(Transition::Disconnect { user, node });
        self.commit_local(outcome).await;
    }

    /// A locally-attached client set an explicit status.
    pub async fn update_status_local(&self, user: UserId, status: PresenceStatus) {
        let outcome = self.registry.apply(Transition::Status { user, status });
        self.commit_local(outcome).await;
    }

    /// Apply a validated upstream log event. `dedup_key` is stable
    /// across broker redeliveries of the same entry.
    pub async fn apply_upstream(&self, event: UpstreamEvent, dedup_key: &str) {
        if !self.registry.observe_dedup(dedup_key) {
            self.metrics.record_duplicate();
            debug!(key = dedup_key, "Duplicate log entry suppressed");
            return;
        }

        let transition = match event {
            UpstreamEvent::Connected {
                user_id,
                source_node_id,
            } => Transition::Connect {
                user: user_id,
                node: attributed(source_node_id),
            },
            UpstreamEvent::Disconnected {
                user_id,
                source_node_id,
            } => Transition::Disconnect {
                user: user_id,
                node: attributed(source_node_id),
            },
            UpstreamEvent::StatusUpdate { user_id, status } => Transition::Status {
                user: user_id,
                status,
            },
            UpstreamEvent::Logout { user_id } => Transition::ForceOffline { user: user_id },
        };

        let outcome = self.registry.apply(transition);
        self.commit_local(outcome).await;
    }

    /// Apply a presence event received from the backplane.
    pub async fn apply_remote(&self, event: PresenceEvent) {
        let outcome = self.registry.apply(Transition::Mirror(event.clone()));
        if outcome.duplicate {
            self.metrics.record_duplicate();
            return;
        }
        self.metrics.record_applied();
        self.run_timer_action(outcome.timer);
        if outcome.status_changed {
            // Forward the remote transition to locally-attached
            // subscribers; never re-broadcast or re-publish it.
            self.fanout.deliver(&event).await;
        }
    }

    /// A grace timer fired; demote if the user is still gone everywhere.
    pub async fn handle_grace_expiry(&self, user: UserId, epoch: u64) {
        let outcome = self.registry.apply(Transition::GraceExpired { user, epoch });
        self.commit_local(outcome).await;
    }

    /// Declare dead nodes and discount their connection counts.
    ///
    /// Every node applies the discount to its own mirror; only the sweep
    /// leader broadcasts and publishes the resulting offline transitions,
    /// so the cluster emits each one exactly once.
    pub async fn sweep_dead_nodes(&self) {
        for node in self.membership.reap_expired() {
            let events = self.registry.apply_node_down(&node);
            if events.is_empty() {
                continue;
            }
            let leader = self.membership.is_sweep_leader();
            warn!(
                node = %node,
                users = events.len(),
                leader,
                "Discounted dead node's connections"
            );
            for event in events {
                self.metrics.record_applied();
                self.fanout.deliver(&event).await;
                if leader {
                    self.broadcast(&event).await;
                    self.publish_downstream(&event).await;
                }
            }
        }
    }

    /// Read a user's status; `None` means no record anywhere we know of.
    pub fn get_status(&self, user: &UserId) -> Option<PresenceSnapshot> {
        self.registry.snapshot(user)
    }

    /// Number of resident records.
    pub fn record_count(&self) -> usize {
        self.registry.len()
    }

    /// Periodic maintenance: dead-node sweep and record eviction.
    pub async fn run_maintenance(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<()>,
    ) {
        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    debug!("Maintenance sweep stopping");
                    return;
                }
            }
            self.sweep_dead_nodes().await;
            let evicted = self.registry.evict_excess();
            if evicted > 0 {
                self.metrics.record_evicted(evicted as u64);
                debug!(evicted, "Evicted idle presence records");
            }
        }
    }

    async fn commit_local(&self, outcome: ApplyOutcome) {
        if outcome.duplicate {
            self.metrics.record_duplicate();
            return;
        }
        self.run_timer_action(outcome.timer);

        let Some(event) = outcome.event else {
            return;
        };
        self.metrics.record_applied();
        self.broadcast(&event).await;

        if outcome.status_changed {
            self.fanout.deliver(&event).await;
            self.publish_downstream(&event).await;
        }
    }

    fn run_timer_action(&self, action: Option<TimerAction>) {
        match action {
            Some(TimerAction::Schedule { user, epoch }) => self.reaper.schedule(user, epoch),
            Some(TimerAction::Cancel { user }) => self.reaper.cancel(user),
            None => {}
        }
    }

    async fn broadcast(&self, event: &PresenceEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize presence event");
                return;
            }
        };
        if let Err(e) = self.backplane.publish(&event.channel(), &payload).await {
            // Degraded mode: local presence keeps working, peers catch
            // up from later events.
            warn!(error = %e, "Backplane publish failed; serving local state only");
        }
    }

    async fn publish_downstream(&self, event: &PresenceEvent) {
        let published = PublishedPresence::from(event);
        let payload = match serde_json::to_string(&published) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize downstream record");
                return;
            }
        };
        let partition = partition_for(&event.user_id, self.event_log.partitions);
        let stream = self.event_log.partition_stream(partition);
        match self.producer.append(&stream, &payload).await {
            Ok(()) => self.metrics.record_published(),
            Err(e) => warn!(stream, error = %e, "Downstream publish failed"),
        }
    }
}

/// Attribute an upstream event to the producer-reported node, or to the
/// shared pseudo-node when unreported.
fn attributed(node: Option<NodeId>) -> NodeId {
    node.unwrap_or_else(|| NodeId::new(UPSTREAM_NODE))
}

/// Stable partition for a user id.
fn partition_for(user: &UserId, partitions: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    user.hash(&mut hasher);
    (hasher.finish() % u64::from(partitions.max(1))) as u32
}
