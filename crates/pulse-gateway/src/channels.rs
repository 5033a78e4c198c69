//! Channel subscriptions with a reverse index for fast cleanup.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::handle::ConnectionId;

/// Which connections listen to which channels.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Channel name → subscriber connection ids.
    channels: DashMap<String, HashSet<ConnectionId>>,
    /// Connection id → subscribed channel names.
    by_conn: DashMap<ConnectionId, HashSet<String>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a channel. Returns `false` when it was
    /// already subscribed.
    pub fn subscribe(&self, channel: &str, conn_id: ConnectionId) -> bool {
        let inserted = self
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(conn_id);
        if inserted {
            self.by_conn
                .entry(conn_id)
                .or_default()
                .insert(channel.to_string());
        }
        inserted
    }

    /// Unsubscribe a connection from a channel.
    pub fn unsubscribe(&self, channel: &str, conn_id: ConnectionId) {
        if let Some(mut subscribers) = self.channels.get_mut(channel) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.channels.remove(channel);
            }
        }
        if let Some(mut channels) = self.by_conn.get_mut(&conn_id) {
            channels.remove(channel);
        }
    }

    /// Drop all of a connection's subscriptions.
    pub fn unsubscribe_all(&self, conn_id: ConnectionId) {
        let Some((_, channels)) = self.by_conn.remove(&conn_id) else {
            return;
        };
        for channel in channels {
            if let Some(mut subscribers) = self.channels.get_mut(&channel) {
                subscribers.remove(&conn_id);
                if subscribers.is_empty() {
                    drop(subscribers);
                    self.channels.remove(&channel);
                }
            }
        }
    }

    /// Subscriber connection ids for a channel.
    pub fn subscribers(&self, channel: &str) -> Vec<ConnectionId> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of channels a connection subscribes to.
    pub fn subscription_count(&self, conn_id: ConnectionId) -> usize {
        self.by_conn
            .get(&conn_id)
            .map(|channels| channels.len())
            .unwrap_or(0)
    }

    /// Number of active channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
