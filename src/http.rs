//! HTTP surface: status queries and health/readiness.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use pulse_core::config::event_log::EventLogConfig;
use pulse_core::health::{HealthSnapshot, HealthState};
use pulse_core::types::id::UserId;
use pulse_gateway::metrics::{GatewayMetrics, GatewaySnapshot};
use pulse_gateway::ws::{GatewayState, ws_handler};
use pulse_registry::metrics::MetricsSnapshot;
use pulse_registry::service::PresenceService;

/// Shared state for the query and health routes.
#[derive(Clone)]
pub struct AppState {
    /// The presence service.
    pub service: Arc<PresenceService>,
    /// Health flags.
    pub health: Arc<HealthState>,
    /// Gateway counters.
    pub gateway_metrics: Arc<GatewayMetrics>,
    /// Event log settings (lag threshold).
    pub event_log: EventLogConfig,
}

/// Build the application router.
pub fn router(state: AppState, gateway: GatewayState) -> Router {
    let ws = Router::new().route("/ws", get(ws_handler)).with_state(gateway);

    let api = Router::new()
        .route("/presence/{user_id}", get(get_status))
        .route("/presence/query", post(query_status))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .with_state(state);

    ws.merge(api).layer(TraceLayer::new_for_http())
}

/// One user's queryable presence.
#[derive(Debug, Serialize)]
struct StatusResponse {
    /// The queried user.
    user_id: String,
    /// `online`, `away`, `offline`, or `unknown` when no record exists.
    status: String,
    /// Last time the user was seen, when known.
    last_seen_at: Option<DateTime<Utc>>,
}

fn status_of(service: &PresenceService, user_id: String) -> StatusResponse {
    match service.get_status(&UserId::new(user_id.clone())) {
        Some(snapshot) => StatusResponse {
            user_id,
            status: snapshot.status.as_str().to_string(),
            last_seen_at: Some(snapshot.last_seen_at),
        },
        None => StatusResponse {
            user_id,
            status: "unknown".to_string(),
            last_seen_at: None,
        },
    }
}

/// `GET /presence/{user_id}`
async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<StatusResponse> {
    Json(status_of(&state.service, user_id))
}

/// Bulk status query body.
#[derive(Debug, Deserialize)]
struct QueryRequest {
    /// Users to look up.
    user_ids: Vec<String>,
}

/// `POST /presence/query`
async fn query_status(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Json<Vec<StatusResponse>> {
    Json(
        request
            .user_ids
            .into_iter()
            .map(|user_id| status_of(&state.service, user_id))
            .collect(),
    )
}

/// `GET /health/live`
async fn live() -> &'static str {
    "ok"
}

/// Readiness payload.
#[derive(Debug, Serialize)]
struct ReadyResponse {
    /// `ok` or `degraded`.
    status: &'static str,
    /// Transport health flags.
    health: HealthSnapshot,
    /// Whether upstream ingestion has fallen behind the warn threshold.
    ingest_lagging: bool,
    /// Resident presence records.
    resident_records: usize,
    /// Presence pipeline counters.
    presence: MetricsSnapshot,
    /// Gateway counters.
    gateway: GatewaySnapshot,
}

/// `GET /health/ready`
///
/// Degraded transports are warnings, not failures: the node keeps
/// serving locally-known presence, so readiness stays 200 with flags.
async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let health = state.health.snapshot();
    let lag_threshold = chrono::Duration::seconds(state.event_log.lag_warn_seconds as i64);
    let ingest_lagging = health
        .last_ingest_at
        .map(|at| Utc::now() - at > lag_threshold)
        .unwrap_or(true);

    let degraded = !health.backplane_connected || health.cluster_partitioned || ingest_lagging;

    Json(ReadyResponse {
        status: if degraded { "degraded" } else { "ok" },
        health,
        ingest_lagging,
        resident_records: state.service.record_count(),
        presence: state.service.metrics().snapshot(),
        gateway: state.gateway_metrics.snapshot(),
    })
}
