//! Dead-node discount and partition guard.

use std::time::Duration;

use chrono::Utc;
use pulse_core::events::presence::PresenceStatus;
use pulse_core::types::id::{NodeId, UserId};

use crate::helpers::{TestCluster, settle};

const GRACE: Duration = Duration::from_secs(30);

#[tokio::test(start_paused = true)]
async fn test_dead_node_counts_are_discounted_immediately() {
    let cluster = TestCluster::new();
    let node_a = cluster.spawn_node("node-a", GRACE).await;
    let node_b = cluster.spawn_node("node-b", GRACE).await;

    // u1's only connection lives on node-b; node-a mirrors it.
    node_b.service.connect_local(UserId::new("u1")).await;
    settle().await;
    assert_eq!(
        node_a
            .service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Online
    );

    // node-b went silent long ago from node-a's point of view.
    node_a
        .membership
        .observe_heartbeat_at(&NodeId::new("node-b"), Utc::now() - chrono::Duration::seconds(60));

    // The sweep demotes without waiting for any grace timer.
    node_a.service.sweep_dead_nodes().await;
    assert_eq!(
        node_a
            .service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Offline
    );
    // node-a is the lowest live node, so it published the offline.
    assert_eq!(cluster.published_statuses(), vec!["online", "offline"]);
}

#[tokio::test(start_paused = true)]
async fn test_partitioned_node_declares_nobody_dead() {
    let cluster = TestCluster::new();
    let node_a = cluster.spawn_node("node-a", GRACE).await;
    let node_b = cluster.spawn_node("node-b", GRACE).await;

    node_b.service.connect_local(UserId::new("u1")).await;
    settle().await;

    // node-a's own echo is stale too: it is cut off from the broker,
    // not observing a crashed peer.
    let long_ago = Utc::now() - chrono::Duration::seconds(60);
    node_a
        .membership
        .observe_heartbeat_at(&NodeId::new("node-b"), long_ago);
    node_a
        .membership
        .observe_heartbeat_at(&NodeId::new("node-a"), long_ago);
    assert!(node_a.membership.is_partitioned());

    node_a.service.sweep_dead_nodes().await;

    // Local state keeps serving; nobody was demoted.
    assert_eq!(
        node_a
            .service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Online
    );
    assert_eq!(cluster.published_statuses(), vec!["online"]);
}
