//! Upstream event-log ingestion: the full consume → apply → publish path.

use std::time::Duration;

use pulse_core::events::presence::PresenceStatus;
use pulse_core::traits::event_log::{EventLogProducer, LogEntry};
use pulse_core::types::id::UserId;

use crate::helpers::{TestCluster, settle};

const GRACE: Duration = Duration::from_secs(30);

#[tokio::test(start_paused = true)]
async fn test_connected_then_disconnected_scenario() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    cluster
        .upstream
        .append(
            "user-events",
            r#"{"event":"user_connected","user_id":"u1","metadata":{}}"#,
        )
        .await
        .unwrap();
    settle().await;

    // Online is published immediately, no debounce.
    assert_eq!(cluster.published_statuses(), vec!["online"]);

    // The disconnect arrives 40s later; its own grace window starts then.
    tokio::time::sleep(Duration::from_secs(40)).await;
    cluster
        .upstream
        .append(
            "user-events",
            r#"{"event":"user_disconnected","user_id":"u1","metadata":{}}"#,
        )
        .await
        .unwrap();

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
async fn test_logout_forces_offline_without_grace() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    cluster
        .upstream
        .append("user-events", r#"{"event":"user_connected","user_id":"u2"}"#)
        .await
        .unwrap();
    settle().await;

    cluster
        .upstream
        .append("user-events", r#"{"event":"user_logout","user_id":"u2"}"#)
        .await
        .unwrap();
    settle().await;

    assert_eq!(cluster.published_statuses(), vec!["online", "offline"]);
    assert_eq!(
        node.service
            .get_status(&UserId::new("u2"))
            .expect("record")
            .status,
        PresenceStatus::Offline
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_update_mirrors_away() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    cluster
        .upstream
        .append(
            "connection-events",
            r#"{"event":"user_connected","user_id":"u3"}"#,
        )
        .await
        .unwrap();
    cluster
        .upstream
        .append(
            "user-events",
            r#"{"event":"status_update","user_id":"u3","metadata":{"status":"away"}}"#,
        )
        .await
        .unwrap();
    settle().await;

    assert_eq!(cluster.published_statuses(), vec!["online", "away"]);
    assert_eq!(
        node.service
            .get_status(&UserId::new("u3"))
            .expect("record")
            .status,
        PresenceStatus::Away
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_is_skipped_not_fatal() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    cluster
        .upstream
        .append("user-events", "this is not json")
        .await
        .unwrap();
    cluster
        .upstream
        .append("user-events", r#"{"event":"user_exploded","user_id":"u4"}"#)
        .await
        .unwrap();
    cluster
        .upstream
        .append("user-events", r#"{"event":"user_connected","user_id":"u4"}"#)
        .await
        .unwrap();
    settle().await;

    // The consumer survived and applied the valid message.
    assert_eq!(cluster.published_statuses(), vec!["online"]);
    assert_eq!(node.service.metrics().snapshot().malformed_events, 2);
    // Everything was acked, including the skipped garbage.
    assert_eq!(cluster.upstream.acked_keys().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_broker_redelivery_applies_once() {
    let cluster = TestCluster::new();
    let node = cluster.spawn_node("node-a", GRACE).await;

    cluster
        .upstream
        .append("user-events", r#"{"event":"user_connected","user_id":"u6"}"#)
        .await
        .unwrap();
    settle().await;

    // The broker redelivers the same entry (same entry id).
    cluster.upstream.redeliver(LogEntry {
        stream: "user-events".to_string(),
        entry_id: "1-0".to_string(),
        payload: r#"{"event":"user_connected","user_id":"u6"}"#.to_string(),
    });
    settle().await;

    assert_eq!(cluster.published_statuses(), vec!["online"]);
    assert_eq!(node.service.metrics().snapshot().duplicates_suppressed, 1);
}
