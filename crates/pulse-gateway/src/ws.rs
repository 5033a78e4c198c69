//! The WebSocket endpoint.
//!
//! Authentication happens before the upgrade: a bad token is rejected
//! with 401 and never reaches the connection manager or the registry.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use pulse_core::config::gateway::GatewayConfig;
use pulse_core::types::id::UserId;

use crate::authenticator::{AcceptedConnection, ConnectRequest, Gatekeeper};
use crate::keepalive::run_keepalive;
use crate::manager::ConnectionManager;

/// Shared state for the WebSocket route.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// The gatekeeper.
    pub gatekeeper: Arc<Gatekeeper>,
    /// The connection manager.
    pub manager: Arc<ConnectionManager>,
    /// Gateway settings.
    pub config: GatewayConfig,
}

/// Query parameters of a connect attempt.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Bearer token.
    token: String,
    /// Comma-separated user ids to watch.
    #[serde(default)]
    watch: Option<String>,
}

/// `GET /ws?token=...&watch=u1,u2`
pub async fn ws_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let watch: Vec<UserId> = params
        .watch
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|id| !id.is_empty())
        .map(UserId::from)
        .collect();

    let request = ConnectRequest {
        token: params.token,
        watch,
    };

    match state.gatekeeper.accept(request).await {
        Ok(accepted) => ws
            .on_upgrade(move |socket| handle_socket(state, accepted, socket))
            .into_response(),
        Err(e) => {
            state.manager.metrics().record_auth_failure();
            debug!(error = %e, "Connection rejected");
            (StatusCode::UNAUTHORIZED, e.message).into_response()
        }
    }
}

/// Pump loops for one accepted connection.
async fn handle_socket(state: GatewayState, accepted: AcceptedConnection, socket: WebSocket) {
    let (handle, mut rx) = state.manager.register(accepted).await;
    let (mut sink, mut stream) = socket.split();

    // Writer: serialized frames → socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Keepalive pings.
    let keepalive = tokio::spawn(run_keepalive(handle.clone(), state.config.clone()));

    // Reader: client frames → manager. The liveness tick notices
    // keepalive-declared deaths even when the socket stays silent.
    let mut liveness = tokio::time::interval(std::time::Duration::from_secs(5));
    loop {
        tokio::select! {
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        state.manager.handle_frame(&handle.id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Protocol ping/pong is answered by the transport layer.
                    Some(Ok(_)) => {}
                }
            }
            _ = liveness.tick() => {}
        }
        if !handle.is_alive() {
            break;
        }
    }

    keepalive.abort();
    writer.abort();
    state.manager.unregister(&handle.id).await;
}
