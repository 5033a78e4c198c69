//! The pub/sub backplane seam.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::result::AppResult;

/// A message received from the backplane.
#[derive(Debug, Clone)]
pub struct BackplaneMessage {
    /// The channel the message arrived on.
    pub channel: String,
    /// The raw payload.
    pub payload: String,
}

/// What a subscriber wants to receive.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    /// Exact channel names.
    pub channels: Vec<String>,
    /// Prefix patterns, `*`-terminated (e.g. `presence:*`).
    pub patterns: Vec<String>,
}

impl Subscription {
    /// Whether a concrete channel name matches this subscription.
    pub fn matches(&self, channel: &str) -> bool {
        self.channels.iter().any(|c| c == channel)
            || self
                .patterns
                .iter()
                .any(|p| channel.starts_with(p.trim_end_matches('*')))
    }
}

/// Stream of messages delivered to a subscriber.
pub type BackplaneStream = mpsc::Receiver<BackplaneMessage>;

/// Fan-out transport between nodes.
///
/// Delivery is at-least-once and unordered across nodes; consumers
/// de-duplicate by correlation id. Implementations must keep `publish`
/// cheap: callers never hold registry locks across it, but they do call
/// it on the connect/disconnect hot path.
#[async_trait]
pub trait Backplane: Send + Sync + std::fmt::Debug {
    /// Publish a payload to a channel.
    ///
    /// An unreachable broker surfaces as
    /// [`BackplaneUnavailable`](crate::error::ErrorKind::BackplaneUnavailable);
    /// the node keeps serving locally-known presence meanwhile.
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()>;

    /// Open a subscription. The returned stream yields until the
    /// backplane shuts down; transient broker loss is retried inside the
    /// implementation, not surfaced to the stream.
    async fn subscribe(&self, subscription: Subscription) -> AppResult<BackplaneStream>;
}
