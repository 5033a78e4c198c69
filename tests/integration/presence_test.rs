//! Grace-window and multi-node presence properties.

use std::time::Duration;

use pulse_core::events::presence::PresenceStatus;
use pulse_core::types::id::UserId;

use crate::helpers::{TestCluster, settle};

const GRACE: Duration = Duration::from_secs(30);

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_publishes_nothing() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    node.service.connect_local(UserId::new("u1")).await;
    settle().await;
    assert_eq!(cluster.published_statuses(), vec!["online"]);

    node.service.disconnect_local(UserId::new("u1")).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    node.service.connect_local(UserId::new("u1")).await;

    // Well past the original grace deadline: the reconnect cancelled it.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(cluster.published_statuses(), vec!["online"]);
    assert_eq!(
        node.service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Online
    );
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_publishes_exactly_one_offline() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    node.service.connect_local(UserId::new("u1")).await;
    settle().await;
    node.service.disconnect_local(UserId::new("u1")).await;

    // Inside the window: still online, nothing new published.
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(cluster.published_statuses(), vec!["online"]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cluster.published_statuses(), vec!["online", "offline"]);
    assert_eq!(
        node.service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Offline
    );
}

#[tokio::test(start_paused = true)]
async fn test_multi_device_across_nodes() {
    let cluster = TestCluster::new();
    let node_a = cluster.spawn_node("node-a", GRACE).await;
    let node_b = cluster.spawn_node("node-b", GRACE).await;

    // Device A on node-a, device B on node-b.
    node_a.service.connect_local(UserId::new("u1")).await;
    settle().await;
    node_b.service.connect_local(UserId::new("u1")).await;
    settle().await;

    // Only the first connect was a transition.
    assert_eq!(cluster.published_statuses(), vec!["online"]);

    // Dropping device A alone keeps the user online past any grace.
    node_a.service.disconnect_local(UserId::new("u1")).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(cluster.published_statuses(), vec!["online"]);
    assert_eq!(
        node_b
            .service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Online
    );

    // Dropping the last device demotes after the grace window, once.
    node_b.service.disconnect_local(UserId::new("u1")).await;
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(cluster.published_statuses(), vec!["online", "offline"]);
    assert_eq!(
        node_a
            .service
            .get_status(&UserId::new("u1"))
            .expect("record")
            .status,
        PresenceStatus::Offline
    );
}

#[tokio::test(start_paused = true)]
async fn test_remote_transitions_reach_local_subscribers_once() {
    let cluster = TestCluster::new();
    let node_a = cluster.spawn_node("node-a", GRACE).await;
    let node_b = cluster.spawn_node("node-b", GRACE).await;

    node_a.service.connect_local(UserId::new("u7")).await;
    settle().await;

    // node-b saw the transition exactly once despite at-least-once
    // delivery semantics on the backplane.
    let delivered = node_b.sink.events();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status, PresenceStatus::Online);

    // A disconnect inside the grace window is not a transition and must
    // not reach clients anywhere.
    node_a.service.disconnect_local(UserId::new("u7")).await;
    settle().await;
    assert_eq!(node_b.sink.events().len(), 1);
    assert_eq!(node_a.sink.events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backplane_redelivery_is_deduplicated() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-b", GRACE).await;

    let event = pulse_core::events::presence::PresenceEvent {
        kind: pulse_core::events::presence::PresenceEventKind::Connected,
        user_id: UserId::new("u5"),
        status: PresenceStatus::Online,
        connection_count: 1,
        timestamp: chrono::Utc::now(),
        source_node_id: pulse_core::types::id::NodeId::new("node-x"),
        correlation_id: uuid::Uuid::new_v4(),
    };
    let payload = serde_json::to_string(&event).unwrap();

    use pulse_core::traits::backplane::Backplane;
    cluster.backplane.publish("presence:u5", &payload).await.unwrap();
    cluster.backplane.publish("presence:u5", &payload).await.unwrap();
    settle().await;

    // One externally observable transition, not two.
    assert_eq!(node.sink.events().len(), 1);
    assert_eq!(node.service.metrics().snapshot().duplicates_suppressed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_user_has_no_record() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;
    assert!(node.service.get_status(&UserId::new("ghost")).is_none());
}
