//! Pulse Server — distributed presence and realtime-event fanout.
//!
//! Main entry point that wires all crates together and starts the node.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use pulse_backplane::RedisBackplane;
use pulse_bridge::RedisEventLog;
use pulse_bridge::dispatch::{node_subscription, run_backplane_dispatcher};
use pulse_bridge::ingest::run_ingest;
use pulse_cluster::heartbeat::run_heartbeat_emitter;
use pulse_cluster::membership::Membership;
use pulse_core::config::AppConfig;
use pulse_core::error::AppError;
use pulse_core::health::HealthState;
use pulse_core::traits::backplane::Backplane;
use pulse_core::traits::event_log::{EventLogConsumer, EventLogProducer};
use pulse_core::types::id::NodeId;
use pulse_gateway::authenticator::{Gatekeeper, TokenVerifier};
use pulse_gateway::channels::SubscriptionRegistry;
use pulse_gateway::fanout::LocalFanout;
use pulse_gateway::manager::ConnectionManager;
use pulse_gateway::metrics::GatewayMetrics;
use pulse_gateway::pool::ConnectionPool;
use pulse_gateway::ws::GatewayState;
use pulse_registry::reaper::{reaper_channel, run_reaper};
use pulse_registry::registry::PresenceRegistry;
use pulse_registry::service::PresenceService;

mod http;

#[tokio::main]
async fn main() {
    let env = std::env::var("PULSE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_target(true).init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function.
async fn run(config: AppConfig) -> Result<(), AppError> {
    let node_id = config
        .cluster
        .node_id
        .clone()
        .map(NodeId::new)
        .unwrap_or_else(NodeId::generate);

    tracing::info!(
        node_id = %node_id,
        version = env!("CARGO_PKG_VERSION"),
        "Starting Pulse"
    );

    let health = Arc::new(HealthState::new());
    let membership = Arc::new(Membership::new(
        node_id.clone(),
        Duration::from_secs(config.cluster.heartbeat_interval_seconds),
        config.cluster.liveness_misses,
    ));

    // ── Broker connections (fatal if unreachable at startup) ─────
    let backplane: Arc<dyn Backplane> =
        Arc::new(RedisBackplane::connect(&config.backplane, health.clone()).await?);
    let event_log = RedisEventLog::connect(&config.event_log, node_id.as_str()).await?;
    let producer: Arc<dyn EventLogProducer> = Arc::new(event_log.clone());
    let consumer: Arc<dyn EventLogConsumer> = Arc::new(event_log);

    // ── Gateway plumbing ─────────────────────────────────────────
    let pool = Arc::new(ConnectionPool::new());
    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let gateway_metrics = Arc::new(GatewayMetrics::new());
    let fanout = Arc::new(LocalFanout::new(
        pool.clone(),
        subscriptions.clone(),
        gateway_metrics.clone(),
    ));

    // ── Presence core ────────────────────────────────────────────
    let registry = PresenceRegistry::new(membership.clone(), &config.presence);
    let (reaper_handle, reaper_rx) = reaper_channel();
    let service = Arc::new(PresenceService::new(
        registry,
        backplane.clone(),
        producer,
        fanout,
        membership.clone(),
        reaper_handle,
        config.event_log.clone(),
    ));

    let manager = Arc::new(ConnectionManager::new(
        pool,
        subscriptions,
        service.clone(),
        config.gateway.clone(),
        gateway_metrics.clone(),
    ));
    let gatekeeper = Arc::new(Gatekeeper::new(TokenVerifier::new(&config.auth)));

    // ── Background tasks ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    tokio::spawn(run_reaper(
        reaper_rx,
        service.clone(),
        Duration::from_secs(config.presence.grace_period_seconds),
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_heartbeat_emitter(
        backplane.clone(),
        membership.clone(),
        health.clone(),
        shutdown_rx.clone(),
    ));
    let backplane_stream = backplane.subscribe(node_subscription()).await?;
    tokio::spawn(run_backplane_dispatcher(
        backplane_stream,
        service.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_ingest(
        consumer,
        service.clone(),
        health.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(service.clone().run_maintenance(
        Duration::from_secs(config.presence.sweep_interval_seconds),
        shutdown_rx.clone(),
    ));

    // ── HTTP surface ─────────────────────────────────────────────
    let gateway_state = GatewayState {
        gatekeeper,
        manager: manager.clone(),
        config: config.gateway.clone(),
    };
    let app_state = http::AppState {
        service: service.clone(),
        health: health.clone(),
        gateway_metrics,
        event_log: config.event_log.clone(),
    };
    let app = http::router(app_state, gateway_state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr())
        .await
        .map_err(|e| {
            AppError::internal(format!("Failed to bind {}: {e}", config.server.bind_addr()))
        })?;
    tracing::info!(addr = %config.server.bind_addr(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // Stop background loops after the server drains.
    let _ = shutdown_tx.send(());
    tracing::info!("Pulse stopped");
    Ok(())
}
