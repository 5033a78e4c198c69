//! Presence status and the wire representation of a presence change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::id::{NodeId, UserId};

/// User presence status.
///
/// "unknown" is deliberately not a variant: it is a query-result concept
/// for users the cluster has no record of, not a state a record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// At least one live connection somewhere in the cluster, or a
    /// disconnect still inside its grace window.
    Online,
    /// User explicitly marked away; still connected.
    Away,
    /// No live connection anywhere and no pending grace timer.
    Offline,
}

impl PresenceStatus {
    /// Parses from a string with a default fallback.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "online" => Self::Online,
            "away" => Self::Away,
            "offline" => Self::Offline,
            _ => Self::Offline,
        }
    }

    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }

    /// Whether this status counts as connected for fanout purposes.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

/// What happened at the source node to produce a [`PresenceEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceEventKind {
    /// A connection was registered at the source node.
    Connected,
    /// A connection was dropped at the source node; count sync only,
    /// the user may still be inside the grace window.
    Disconnected,
    /// An explicit status update (online <-> away).
    StatusChanged,
    /// Grace window elapsed, logout received, or a dead node was
    /// discounted; the user is offline.
    WentOffline,
}

/// A presence change as carried on the backplane and applied by mirrors.
///
/// Immutable once emitted. `connection_count` is the source node's local
/// count for the user after the transition; mirrors overwrite their view
/// of that node's contribution with it, which makes replays harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// What happened.
    pub kind: PresenceEventKind,
    /// The user the event concerns.
    pub user_id: UserId,
    /// The source node's view of the user-level status after the change.
    pub status: PresenceStatus,
    /// The source node's local connection count after the change.
    pub connection_count: u32,
    /// When the source node applied the change.
    pub timestamp: DateTime<Utc>,
    /// The node that originated the event.
    pub source_node_id: NodeId,
    /// Correlation id for de-duplication under at-least-once delivery.
    pub correlation_id: Uuid,
}

impl PresenceEvent {
    /// The backplane/fanout channel carrying events for this user.
    pub fn channel(&self) -> String {
        presence_channel(&self.user_id)
    }
}

/// Channel name for a user's presence topic.
pub fn presence_channel(user_id: &UserId) -> String {
    format!("presence:{user_id}")
}

/// The record published to the downstream `presence-events` topic.
///
/// This is the contract consumed by notification orchestration and
/// analytics; it carries only the externally observable transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedPresence {
    /// The user the transition concerns.
    pub user_id: UserId,
    /// The status after the transition.
    pub status: PresenceStatus,
    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
    /// The node that applied the transition.
    pub source_node_id: NodeId,
    /// Correlation id, carried through for downstream de-duplication.
    pub correlation_id: Uuid,
}

impl From<&PresenceEvent> for PublishedPresence {
    fn from(event: &PresenceEvent) -> Self {
        Self {
            user_id: event.user_id.clone(),
            status: event.status,
            timestamp: event.timestamp,
            source_node_id: event.source_node_id.clone(),
            correlation_id: event.correlation_id,
        }
    }
}
