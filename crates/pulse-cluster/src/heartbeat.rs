//! Periodic heartbeat announcements over the backplane.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, warn};

use pulse_core::events::cluster::{HEARTBEAT_CHANNEL, Heartbeat};
use pulse_core::health::HealthState;
use pulse_core::traits::backplane::Backplane;

use crate::membership::Membership;

/// Announce this node on the heartbeat channel until shutdown.
///
/// Also refreshes the membership partition flag on every tick: the
/// emitter is the one task guaranteed to run at heartbeat cadence, so it
/// doubles as the place where "have we heard our own echo lately" is
/// checked and reported to the health surface.
pub async fn run_heartbeat_emitter(
    backplane: Arc<dyn Backplane>,
    membership: Arc<Membership>,
    health: Arc<HealthState>,
    mut shutdown: watch::Receiver<()>,
) {
    let mut ticker = time::interval(membership.heartbeat_interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                debug!("Heartbeat emitter stopping");
                return;
            }
        }

        let beat = Heartbeat::now(membership.self_node().clone());
        let payload = match serde_json::to_string(&beat) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize heartbeat");
                continue;
            }
        };

        if let Err(e) = backplane.publish(HEARTBEAT_CHANNEL, &payload).await {
            warn!(error = %e, "Heartbeat publish failed; backplane degraded");
        }

        let partitioned = membership.is_partitioned();
        if partitioned {
            warn!("No heartbeat echo from backplane; cluster state degraded");
        }
        health.set_cluster_partitioned(partitioned);
    }
}
