//! Backplane message dispatch.
//!
//! One subscription per node covers everything the node consumes from
//! the backplane: the heartbeat channel and the per-user presence
//! channels (`presence:*`). This loop routes each message to the right
//! component; de-duplication downstream makes our own echoes harmless.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use pulse_core::events::cluster::{HEARTBEAT_CHANNEL, Heartbeat};
use pulse_core::events::presence::PresenceEvent;
use pulse_core::traits::backplane::{BackplaneStream, Subscription};
use pulse_registry::service::PresenceService;

/// The subscription every node opens on the backplane.
pub fn node_subscription() -> Subscription {
    Subscription {
        channels: vec![HEARTBEAT_CHANNEL.to_string()],
        patterns: vec!["presence:*".to_string()],
    }
}

/// Route backplane messages until shutdown or stream end.
pub async fn run_backplane_dispatcher(
    mut stream: BackplaneStream,
    service: Arc<PresenceService>,
    mut shutdown: watch::Receiver<()>,
) {
    loop {
        tokio::select! {
            message = stream.recv() => {
                let Some(message) = message else {
                    debug!("Backplane stream closed");
                    return;
                };
                if message.channel == HEARTBEAT_CHANNEL {
                    match serde_json::from_str::<Heartbeat>(&message.payload) {
                        // Receipt time, not the sender's clock, drives
                        // liveness.
                        Ok(beat) => service.membership().observe_heartbeat(&beat.node_id),
                        Err(e) => warn!(error = %e, "Unparseable heartbeat"),
                    }
                } else if message.channel.starts_with("presence:") {
                    match serde_json::from_str::<PresenceEvent>(&message.payload) {
                        Ok(event) => service.apply_remote(event).await,
                        Err(e) => {
                            warn!(channel = %message.channel, error = %e, "Unparseable presence event")
                        }
                    }
                } else {
                    debug!(channel = %message.channel, "Ignoring unknown backplane channel");
                }
            }
            _ = shutdown.changed() => {
                debug!("Backplane dispatcher stopping");
                return;
            }
        }
    }
}
