//! Upstream event-log message shapes.
//!
//! The `user-events` and `connection-events` topics carry the same
//! envelope: `{event, user_id, metadata}`. Parsing is strict about the
//! envelope and lenient about metadata; anything unparseable is a
//! [`MalformedEvent`](crate::error::ErrorKind::MalformedEvent) and is
//! skipped by the consumer, never fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::events::presence::PresenceStatus;
use crate::result::AppResult;
use crate::types::id::{NodeId, UserId};

/// Raw envelope of an upstream log message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamEnvelope {
    /// Event discriminator, e.g. `user_connected`.
    pub event: String,
    /// The user the event concerns.
    pub user_id: String,
    /// Free-form metadata supplied by the producer.
    #[serde(default)]
    pub metadata: Value,
}

/// A validated upstream event ready for the registry transition function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// A client connected somewhere in the platform.
    Connected {
        /// The user that connected.
        user_id: UserId,
        /// The node that reported the connection, when the producer says.
        source_node_id: Option<NodeId>,
    },
    /// A client disconnected.
    Disconnected {
        /// The user that disconnected.
        user_id: UserId,
        /// The node that reported the disconnect, when the producer says.
        source_node_id: Option<NodeId>,
    },
    /// An explicit status update (away, back online).
    StatusUpdate {
        /// The user whose status changed.
        user_id: UserId,
        /// The requested status.
        status: PresenceStatus,
    },
    /// An explicit logout; forces offline with no grace window.
    Logout {
        /// The user that logged out.
        user_id: UserId,
    },
}

impl UpstreamEvent {
    /// Parse a raw log payload into a validated event.
    pub fn parse(payload: &str) -> AppResult<Self> {
        let envelope: UpstreamEnvelope = serde_json::from_str(payload)
            .map_err(|e| AppError::malformed_event(format!("bad envelope: {e}")))?;

        if envelope.user_id.is_empty() {
            return Err(AppError::malformed_event("empty user_id"));
        }

        let user_id = UserId::new(envelope.user_id);
        let source_node_id = envelope
            .metadata
            .get("node_id")
            .and_then(Value::as_str)
            .map(NodeId::from);

        match envelope.event.as_str() {
            "user_connected" => Ok(Self::Connected {
                user_id,
                source_node_id,
            }),
            "user_disconnected" => Ok(Self::Disconnected {
                user_id,
                source_node_id,
            }),
            "status_update" => {
                let status = envelope
                    .metadata
                    .get("status")
                    .and_then(Value::as_str)
                    .map(PresenceStatus::from_str_or_default)
                    .ok_or_else(|| AppError::malformed_event("status_update without status"))?;
                Ok(Self::StatusUpdate { user_id, status })
            }
            "user_logout" => Ok(Self::Logout { user_id }),
            other => Err(AppError::malformed_event(format!(
                "unknown event type: {other}"
            ))),
        }
    }

    /// The user this event concerns.
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::Connected { user_id, .. }
            | Self::Disconnected { user_id, .. }
            | Self::StatusUpdate { user_id, .. }
            | Self::Logout { user_id } => user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connected() {
        let event = UpstreamEvent::parse(
            r#"{"event":"user_connected","user_id":"u1","metadata":{"node_id":"node-a"}}"#,
        )
        .expect("parse");
        assert_eq!(
            event,
            UpstreamEvent::Connected {
                user_id: UserId::new("u1"),
                source_node_id: Some(NodeId::new("node-a")),
            }
        );
    }

    #[test]
    fn test_parse_disconnected_without_metadata() {
        let event = UpstreamEvent::parse(r#"{"event":"user_disconnected","user_id":"u1"}"#)
            .expect("parse");
        assert_eq!(
            event,
            UpstreamEvent::Disconnected {
                user_id: UserId::new("u1"),
                source_node_id: None,
            }
        );
    }

    #[test]
    fn test_parse_status_update() {
        let event = UpstreamEvent::parse(
            r#"{"event":"status_update","user_id":"u1","metadata":{"status":"away"}}"#,
        )
        .expect("parse");
        assert_eq!(
            event,
            UpstreamEvent::StatusUpdate {
                user_id: UserId::new("u1"),
                status: PresenceStatus::Away,
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_event() {
        let err = UpstreamEvent::parse(r#"{"event":"user_exploded","user_id":"u1"}"#)
            .expect_err("should fail");
        assert_eq!(err.kind, crate::error::ErrorKind::MalformedEvent);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(UpstreamEvent::parse("not json at all").is_err());
        assert!(UpstreamEvent::parse(r#"{"event":"user_connected","user_id":""}"#).is_err());
        assert!(UpstreamEvent::parse(r#"{"event":"status_update","user_id":"u1"}"#).is_err());
    }
}
