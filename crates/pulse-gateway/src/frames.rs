//! Client-facing WebSocket frame types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulse_core::events::presence::{PresenceEvent, PresenceStatus};
use pulse_core::types::id::UserId;

/// Messages a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Subscribe to a presence channel.
    Subscribe {
        /// Channel name, e.g. `presence:u42`.
        channel: String,
    },
    /// Unsubscribe from a channel.
    Unsubscribe {
        /// Channel name.
        channel: String,
    },
    /// Explicit status change (online <-> away).
    Status {
        /// Requested status.
        status: PresenceStatus,
    },
    /// Client-initiated ping.
    Ping,
    /// Reply to a server ping.
    Pong,
}

/// Messages the server pushes to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A presence transition for a watched user.
    Presence {
        /// The user whose presence changed.
        user_id: UserId,
        /// The new status.
        status: PresenceStatus,
        /// When the transition happened.
        timestamp: DateTime<Utc>,
    },
    /// Subscription acknowledged.
    Subscribed {
        /// Channel name.
        channel: String,
    },
    /// Protocol-level error.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable detail.
        message: String,
    },
    /// Server keepalive ping.
    Ping {
        /// Send time.
        timestamp: DateTime<Utc>,
    },
    /// Reply to a client ping.
    Pong {
        /// Send time.
        timestamp: DateTime<Utc>,
    },
}

impl OutboundFrame {
    /// Frame for a presence transition.
    pub fn presence(event: &PresenceEvent) -> Self {
        Self::Presence {
            user_id: event.user_id.clone(),
            status: event.status,
            timestamp: event.timestamp,
        }
    }

    /// Serialize; an unserializable frame becomes an empty string, which
    /// connections drop.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
