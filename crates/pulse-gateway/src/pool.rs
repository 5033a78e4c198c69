//! Pool of live connections, indexed by connection and by user.

use std::sync::Arc;

use dashmap::DashMap;

use pulse_core::types::id::UserId;

use crate::handle::{ConnectionHandle, ConnectionId};

/// All live connections on this node.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// Connection id → handle.
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    /// User id → their connection ids.
    by_user: DashMap<UserId, Vec<ConnectionId>>,
}

impl ConnectionPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.by_user
            .entry(handle.user_id.clone())
            .or_default()
            .push(handle.id);
        self.connections.insert(handle.id, handle);
    }

    /// Remove a connection, returning its handle if it was present.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.connections.remove(conn_id)?;
        if let Some(mut ids) = self.by_user.get_mut(&handle.user_id) {
            ids.retain(|id| id != conn_id);
            if ids.is_empty() {
                drop(ids);
                self.by_user.remove(&handle.user_id);
            }
        }
        Some(handle)
    }

    /// Look up a connection.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(conn_id).map(|entry| entry.clone())
    }

    /// All of a user's connections, oldest first.
    pub fn user_connections(&self, user: &UserId) -> Vec<Arc<ConnectionHandle>> {
        let Some(ids) = self.by_user.get(user) else {
            return Vec::new();
        };
        let mut handles: Vec<Arc<ConnectionHandle>> = ids
            .iter()
            .filter_map(|id| self.connections.get(id).map(|entry| entry.clone()))
            .collect();
        handles.sort_by_key(|handle| handle.connected_at);
        handles
    }

    /// Whether a user has any live connection on this node.
    pub fn user_connected(&self, user: &UserId) -> bool {
        self.by_user
            .get(user)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    /// Total live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Unique connected users.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }
}
