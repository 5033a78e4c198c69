//! Local fanout seam: delivery of presence transitions to connections
//! attached to this node.

use async_trait::async_trait;

use crate::events::presence::PresenceEvent;

/// Delivers externally observable presence transitions to local
/// subscribers. Implemented by the gateway's connection manager; the
/// registry service stays ignorant of WebSocket plumbing.
#[async_trait]
pub trait FanoutSink: Send + Sync + std::fmt::Debug {
    /// Deliver one transition to every local subscriber of the user's
    /// presence channel. Best-effort; slow consumers are dropped, not
    /// awaited.
    async fn deliver(&self, event: &PresenceEvent);
}
