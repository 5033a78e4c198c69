//! WebSocket gateway end to end: gatekeeping and live presence fanout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use futures::StreamExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;

use pulse_core::config::auth::AuthConfig;
use pulse_core::config::event_log::EventLogConfig;
use pulse_core::config::gateway::GatewayConfig;
use pulse_core::config::presence::PresenceConfig;
use pulse_core::traits::backplane::Backplane;
use pulse_core::traits::event_log::EventLogProducer;
use pulse_core::traits::fanout::FanoutSink;
use pulse_core::types::id::NodeId;
use pulse_gateway::authenticator::{Gatekeeper, TokenClaims, TokenVerifier};
use pulse_gateway::channels::SubscriptionRegistry;
use pulse_gateway::fanout::LocalFanout;
use pulse_gateway::manager::ConnectionManager;
use pulse_gateway::metrics::GatewayMetrics;
use pulse_gateway::pool::ConnectionPool;
use pulse_gateway::ws::{GatewayState, ws_handler};
use pulse_registry::reaper::{reaper_channel, run_reaper};
use pulse_registry::registry::PresenceRegistry;
use pulse_registry::service::PresenceService;

use crate::helpers::TestCluster;

const SECRET: &str = "integration-secret";

fn token(sub: &str) -> String {
    let claims = TokenClaims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as u64,
        jti: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("encode")
}

/// Spin up a gateway node backed by the in-memory transports.
async fn start_gateway(cluster: &TestCluster) -> SocketAddr {
    let membership = Arc::new(pulse_cluster::membership::Membership::new(
        NodeId::new("gw-node"),
        Duration::from_secs(5),
        3,
    ));
    let pool = Arc::new(ConnectionPool::new());
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let metrics = Arc::new(GatewayMetrics::new());
    let fanout = Arc::new(LocalFanout::new(
        pool.clone(),
        subscriptions.clone(),
        metrics.clone(),
    ));

    let registry = PresenceRegistry::new(membership.clone(), &PresenceConfig::default());
    let (reaper_handle, reaper_rx) = reaper_channel();
    let service = Arc::new(PresenceService::new(
        registry,
        cluster.backplane.clone() as Arc<dyn Backplane>,
        cluster.downstream.clone() as Arc<dyn EventLogProducer>,
        fanout as Arc<dyn FanoutSink>,
        membership,
        reaper_handle,
        EventLogConfig::default(),
    ));

    let (shutdown, shutdown_rx) = watch::channel(());
    tokio::spawn(run_reaper(
        reaper_rx,
        service.clone(),
        Duration::from_secs(30),
        shutdown_rx,
    ));
    // Keep the shutdown sender alive for the test's lifetime.
    std::mem::forget(shutdown);

    let manager = Arc::new(ConnectionManager::new(
        pool,
        subscriptions,
        service,
        GatewayConfig::default(),
        metrics,
    ));
    let gatekeeper = Arc::new(Gatekeeper::new(TokenVerifier::new(&AuthConfig {
        jwt_secret: SECRET.to_string(),
        leeway_seconds: 5,
    })));

    let state = GatewayState {
        gatekeeper,
        manager,
        config: GatewayConfig::default(),
    };
    let app: Router = Router::new().route("/ws", get(ws_handler)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

#[tokio::test]
async fn test_watcher_receives_presence_transition() {
    let cluster = TestCluster::new();
    let addr = start_gateway(&cluster).await;

    // Watcher connects first, observing u2.
    let url = format!("ws://{addr}/ws?token={}&watch=u2", token("u1"));
    let (mut watcher, _) = connect_async(&url).await.expect("watcher connect");

    // u2 comes online through a second connection.
    let url = format!("ws://{addr}/ws?token={}", token("u2"));
    let (_observed, _) = connect_async(&url).await.expect("observed connect");

    // The watcher gets a presence frame for u2; keepalive pings may
    // interleave.
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let Some(Ok(message)) = watcher.next().await else {
                panic!("watcher stream ended early");
            };
            if let tokio_tungstenite::tungstenite::Message::Text(text) = message {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == "presence" && value["user_id"] == "u2" {
                    break value;
                }
            }
        }
    })
    .await
    .expect("presence frame within timeout");

    assert_eq!(frame["status"], "online");
}

#[tokio::test]
async fn test_invalid_token_is_rejected_before_upgrade() {
    let cluster = TestCluster::new();
    let addr = start_gateway(&cluster).await;

    let url = format!("ws://{addr}/ws?token=not-a-jwt");
    let result = connect_async(&url).await;
    assert!(result.is_err(), "handshake must fail for a bad token");

    // No presence state was created by the failed attempt.
    assert!(cluster.published().is_empty());
}
