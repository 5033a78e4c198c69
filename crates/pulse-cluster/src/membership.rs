//! Heartbeat-based liveness table.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use tracing::{info, warn};

use pulse_core::types::id::NodeId;

/// Tracks which nodes are alive based on heartbeat recency.
///
/// A node is dead after `liveness_misses` consecutive heartbeat
/// intervals without an announcement. The local node observes its own
/// heartbeats echoed back through the backplane; a stale echo means this
/// node is partitioned from the broker, in which case it must not
/// declare peers dead (a partitioned node sees everyone as silent).
#[derive(Debug)]
pub struct Membership {
    /// This process's node id.
    self_node: NodeId,
    /// Node id → last heartbeat seen.
    nodes: DashMap<NodeId, DateTime<Utc>>,
    /// Nodes declared dead; their connection counts are discounted until
    /// they heartbeat again.
    dead: DashSet<NodeId>,
    /// Last time our own heartbeat echoed back from the backplane.
    last_self_echo: RwLock<DateTime<Utc>>,
    /// Heartbeat interval.
    interval: Duration,
    /// Missed intervals before a node is dead.
    misses: u32,
}

impl Membership {
    /// Create a membership table for `self_node`.
    pub fn new(self_node: NodeId, interval: Duration, misses: u32) -> Self {
        Self {
            self_node,
            nodes: DashMap::new(),
            dead: DashSet::new(),
            last_self_echo: RwLock::new(Utc::now()),
            interval,
            misses,
        }
    }

    /// This process's node id.
    pub fn self_node(&self) -> &NodeId {
        &self.self_node
    }

    /// The configured heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        self.interval
    }

    /// Liveness cutoff: nodes silent longer than this are dead.
    fn timeout(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.interval * self.misses)
            .unwrap_or_else(|_| chrono::Duration::seconds(15))
    }

    /// Record a heartbeat from a node.
    pub fn observe_heartbeat(&self, node: &NodeId) {
        self.observe_heartbeat_at(node, Utc::now());
    }

    /// Record a heartbeat with an explicit observation time.
    pub fn observe_heartbeat_at(&self, node: &NodeId, at: DateTime<Utc>) {
        if *node == self.self_node {
            let mut echo = self.last_self_echo.write().unwrap_or_else(|e| e.into_inner());
            *echo = at;
            return;
        }
        if self.dead.remove(node).is_some() {
            info!(node = %node, "Dead node resumed heartbeats");
        }
        if self.nodes.insert(node.clone(), at).is_none() {
            info!(node = %node, "Node joined cluster");
        }
    }

    /// Whether a node's connection counts should still be trusted.
    ///
    /// Nodes the gossip has never seen (external transport reporters)
    /// are trusted; only nodes that were members and then stopped
    /// heartbeating are discounted.
    pub fn is_trusted(&self, node: &NodeId) -> bool {
        *node == self.self_node || !self.dead.contains(node)
    }

    /// Whether a node is currently considered live. The local node is
    /// always live to itself.
    pub fn is_live(&self, node: &NodeId) -> bool {
        self.is_live_at(node, Utc::now())
    }

    /// Liveness check with an explicit reference time.
    pub fn is_live_at(&self, node: &NodeId, now: DateTime<Utc>) -> bool {
        if *node == self.self_node {
            return true;
        }
        self.nodes
            .get(node)
            .map(|seen| now - *seen <= self.timeout())
            .unwrap_or(false)
    }

    /// All nodes currently considered live, including the local node.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let now = Utc::now();
        let timeout = self.timeout();
        let mut live: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|entry| now - *entry.value() <= timeout)
            .map(|entry| entry.key().clone())
            .collect();
        live.push(self.self_node.clone());
        live.sort();
        live
    }

    /// Remove and return nodes whose heartbeats have expired.
    ///
    /// Returns an empty list while partitioned: a node that cannot hear
    /// the broker has no grounds to declare anyone dead.
    pub fn reap_expired(&self) -> Vec<NodeId> {
        self.reap_expired_at(Utc::now())
    }

    /// Expiry sweep with an explicit reference time.
    pub fn reap_expired_at(&self, now: DateTime<Utc>) -> Vec<NodeId> {
        if self.is_partitioned_at(now) {
            return Vec::new();
        }
        let timeout = self.timeout();
        let expired: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|entry| now - *entry.value() > timeout)
            .map(|entry| entry.key().clone())
            .collect();
        for node in &expired {
            self.nodes.remove(node);
            self.dead.insert(node.clone());
            warn!(node = %node, "Node declared dead after missed heartbeats");
        }
        expired
    }

    /// Whether this node is cut off from the backplane heartbeat echo.
    pub fn is_partitioned(&self) -> bool {
        self.is_partitioned_at(Utc::now())
    }

    /// Partition check with an explicit reference time.
    pub fn is_partitioned_at(&self, now: DateTime<Utc>) -> bool {
        let echo = *self.last_self_echo.read().unwrap_or_else(|e| e.into_inner());
        now - echo > self.timeout()
    }

    /// Whether this node is the cluster-wide sweep leader.
    ///
    /// Dead-node discounts are broadcast by exactly one node to avoid a
    /// publication storm; the lowest live node id wins. Every node still
    /// applies the discount to its own mirror.
    pub fn is_sweep_leader(&self) -> bool {
        self.live_nodes()
            .first()
            .map(|lowest| *lowest == self.self_node)
            .unwrap_or(true)
    }
}
