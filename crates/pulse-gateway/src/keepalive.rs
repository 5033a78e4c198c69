//! App-level ping/pong keepalive for client connections.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::debug;

use pulse_core::config::gateway::GatewayConfig;

use crate::frames::OutboundFrame;
use crate::handle::ConnectionHandle;

/// Run the keepalive loop for one connection.
///
/// Sends periodic pings and closes the connection when no pong arrives
/// within a full ping cycle plus the timeout allowance.
pub async fn run_keepalive(handle: Arc<ConnectionHandle>, config: GatewayConfig) {
    let interval = Duration::from_secs(config.ping_interval_seconds);
    let allowance = interval + Duration::from_secs(config.ping_timeout_seconds);
    let mut ticker = time::interval(interval);

    loop {
        ticker.tick().await;

        if !handle.is_alive() {
            break;
        }

        let last_pong = *handle.last_pong.read().await;
        let elapsed = Utc::now() - last_pong;
        if let Ok(elapsed) = elapsed.to_std() {
            if elapsed > allowance {
                debug!(
                    conn_id = %handle.id,
                    elapsed_secs = elapsed.as_secs(),
                    "Keepalive timeout, closing connection"
                );
                handle.mark_closed();
                break;
            }
        }

        let ping = OutboundFrame::Ping {
            timestamp: Utc::now(),
        };
        if !handle.send(ping.to_json()) && !handle.is_alive() {
            break;
        }
    }

    debug!(conn_id = %handle.id, "Keepalive loop ended");
}
