//! Sharded presence registry and the state transition function.
//!
//! Every origin (local gateway connects, backplane mirrors, event-log
//! ingestion, reaper expiries) funnels through [`PresenceRegistry::apply`],
//! so there is exactly one place where presence state can change.
//!
//! Shards are guarded by plain mutexes and hold no I/O: callers perform
//! all publishing, fanout, and timer work after the lock is released,
//! driven by the returned [`ApplyOutcome`].

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use pulse_cluster::membership::Membership;
use pulse_core::config::presence::PresenceConfig;
use pulse_core::events::presence::{PresenceEvent, PresenceEventKind, PresenceStatus};
use pulse_core::types::id::{NodeId, UserId};

use std::sync::Arc;

use crate::dedup::CorrelationWindow;
use crate::record::{PresenceRecord, PresenceSnapshot};

/// An input to the transition function.
#[derive(Debug, Clone)]
pub enum Transition {
    /// A connection was registered for the user, attributed to `node`.
    Connect {
        /// The user that connected.
        user: UserId,
        /// The node holding the connection.
        node: NodeId,
    },
    /// A connection was dropped for the user on `node`.
    Disconnect {
        /// The user that disconnected.
        user: UserId,
        /// The node that lost the connection.
        node: NodeId,
    },
    /// Explicit status update (online <-> away). Idle detection happens
    /// upstream; the registry only mirrors.
    Status {
        /// The user whose status changed.
        user: UserId,
        /// The requested status.
        status: PresenceStatus,
    },
    /// Logout: immediate offline, no grace window.
    ForceOffline {
        /// The user that logged out.
        user: UserId,
    },
    /// A grace timer fired. Ignored unless `epoch` is still current.
    GraceExpired {
        /// The user whose timer fired.
        user: UserId,
        /// The demotion epoch the timer was scheduled with.
        epoch: u64,
    },
    /// Another node's transition received from the backplane.
    Mirror(PresenceEvent),
}

/// Timer side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Schedule (or reset) the user's grace timer.
    Schedule {
        /// The user to demote when the timer fires.
        user: UserId,
        /// Epoch guarding against stale expiries.
        epoch: u64,
    },
    /// Cancel the user's grace timer.
    Cancel {
        /// The user whose timer is void.
        user: UserId,
    },
}

/// What a transition produced. All side effects happen outside the lock.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    /// Event to broadcast on the backplane (count sync + transitions).
    /// `None` for no-ops and for mirrors, which are never re-broadcast.
    pub event: Option<PresenceEvent>,
    /// Whether the user-level status changed; gates local fanout and
    /// downstream publication.
    pub status_changed: bool,
    /// Grace timer work for the reaper.
    pub timer: Option<TimerAction>,
    /// The input was a replay inside the de-duplication window.
    pub duplicate: bool,
}

impl ApplyOutcome {
    fn noop() -> Self {
        Self::default()
    }

    fn duplicate() -> Self {
        Self {
            duplicate: true,
            ..Self::default()
        }
    }
}

/// The per-node registry of presence records.
#[derive(Debug)]
pub struct PresenceRegistry {
    /// User shards; chosen by user-id hash.
    shards: Vec<Mutex<HashMap<UserId, PresenceRecord>>>,
    /// Correlation-id replay window.
    dedup: CorrelationWindow,
    /// Liveness oracle for discounting dead nodes' counts.
    membership: Arc<Membership>,
    /// This node's id.
    node_id: NodeId,
    /// Monotonic source of demotion epochs.
    demotion_epoch: AtomicU64,
    /// Resident record bound enforced by eviction.
    max_records: usize,
}

impl PresenceRegistry {
    /// Create a registry with `config.shard_count` shards.
    pub fn new(membership: Arc<Membership>, config: &PresenceConfig) -> Self {
        let shard_count = config.shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        let dedup = CorrelationWindow::new(
            Duration::from_secs(config.dedup_window_seconds),
            (config.max_records as u64).max(1024),
        );
        let node_id = membership.self_node().clone();
        Self {
            shards,
            dedup,
            membership,
            node_id,
            demotion_epoch: AtomicU64::new(0),
            max_records: config.max_records,
        }
    }

    /// This node's id.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn shard(&self, user: &UserId) -> &Mutex<HashMap<UserId, PresenceRecord>> {
        let mut hasher = DefaultHasher::new();
        user.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    fn trusts(&self, node: &NodeId) -> bool {
        *node == self.node_id || self.membership.is_trusted(node)
    }

    fn make_event(
        &self,
        kind: PresenceEventKind,
        user_id: UserId,
        status: PresenceStatus,
        connection_count: u32,
        source: NodeId,
    ) -> PresenceEvent {
        let event = PresenceEvent {
            kind,
            user_id,
            status,
            connection_count,
            timestamp: Utc::now(),
            source_node_id: source,
            correlation_id: Uuid::new_v4(),
        };
        // Remember our own correlation id so the backplane echo of this
        // event is recognized as a replay.
        self.dedup.record(&event.correlation_id.to_string());
        event
    }

    /// Record an external de-duplication key (log entry id). Returns
    /// `false` when the key was already seen.
    pub fn observe_dedup(&self, key: &str) -> bool {
        self.dedup.observe(key)
    }

    /// Apply one transition. Pure state mutation; the caller executes
    /// the returned side effects.
    pub fn apply(&self, transition: Transition) -> ApplyOutcome {
        match transition {
            Transition::Connect { user, node } => self.apply_connect(user, node),
            Transition::Disconnect { user, node } => self.apply_disconnect(user, node),
            Transition::Status { user, status } => self.apply_status(user, status),
            Transition::ForceOffline { user } => self.apply_force_offline(user),
            Transition::GraceExpired { user, epoch } => self.apply_grace_expired(user, epoch),
            Transition::Mirror(event) => self.apply_mirror(event),
        }
    }

    fn apply_connect(&self, user: UserId, node: NodeId) -> ApplyOutcome {
        let now = Utc::now();
        let (old_status, new_status, count, cancel) = {
            let mut guard = self.lock_shard(&user);
            let record = guard.entry(user.clone()).or_default();
            let old_status = record.status;

            *record.counts.entry(node.clone()).or_insert(0) += 1;
            record.owner_node_id = Some(node.clone());
            record.touch(now);

            let cancel = record.pending_demotion != 0;
            record.pending_demotion = 0;

            if old_status == PresenceStatus::Offline {
                record.status = PresenceStatus::Online;
            }
            (old_status, record.status, record.node_count(&node), cancel)
        };

        ApplyOutcome {
            event: Some(self.make_event(
                PresenceEventKind::Connected,
                user.clone(),
                new_status,
                count,
                node,
            )),
            status_changed: old_status != new_status,
            timer: cancel.then(|| TimerAction::Cancel { user }),
            duplicate: false,
        }
    }

    fn apply_disconnect(&self, user: UserId, node: NodeId) -> ApplyOutcome {
        let now = Utc::now();
        let (status, new_count, schedule_epoch) = {
            let mut guard = self.lock_shard(&user);
            let Some(record) = guard.get_mut(&user) else {
                return ApplyOutcome::noop();
            };
            let node_count = record.node_count(&node);
            if node_count == 0 {
                return ApplyOutcome::noop();
            }
            record.touch(now);

            let new_count = node_count - 1;
            if new_count == 0 {
                record.counts.remove(&node);
            } else {
                record.counts.insert(node.clone(), new_count);
            }

            let effective = record.effective_count(|n| self.trusts(n));
            let mut schedule_epoch = None;
            if new_count == 0 && effective == 0 && record.status != PresenceStatus::Offline {
                // Last known connection anywhere: start (or restart) the
                // grace window instead of demoting immediately.
                let epoch = self.demotion_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                record.pending_demotion = epoch;
                schedule_epoch = Some(epoch);
            }
            (record.status, new_count, schedule_epoch)
        };

        ApplyOutcome {
            event: Some(self.make_event(
                PresenceEventKind::Disconnected,
                user.clone(),
                status,
                new_count,
                node,
            )),
            status_changed: false,
            timer: schedule_epoch.map(|epoch| TimerAction::Schedule { user, epoch }),
            duplicate: false,
        }
    }

    fn apply_status(&self, user: UserId, status: PresenceStatus) -> ApplyOutcome {
        if status == PresenceStatus::Offline {
            // Offline is reached through disconnect/logout, never through
            // a status update.
            return ApplyOutcome::noop();
        }
        let now = Utc::now();
        let count = {
            let mut guard = self.lock_shard(&user);
            let Some(record) = guard.get_mut(&user) else {
                return ApplyOutcome::noop();
            };
            if record.status == PresenceStatus::Offline || record.status == status {
                return ApplyOutcome::noop();
            }
            record.status = status;
            record.touch(now);
            record.node_count(&self.node_id)
        };

        ApplyOutcome {
            event: Some(self.make_event(
                PresenceEventKind::StatusChanged,
                user,
                status,
                count,
                self.node_id.clone(),
            )),
            status_changed: true,
            timer: None,
            duplicate: false,
        }
    }

    fn apply_force_offline(&self, user: UserId) -> ApplyOutcome {
        let now = Utc::now();
        let (was_connected, cancel) = {
            let mut guard = self.lock_shard(&user);
            let Some(record) = guard.get_mut(&user) else {
                return ApplyOutcome::noop();
            };
            let was_connected = record.status != PresenceStatus::Offline;
            record.counts.clear();
            record.status = PresenceStatus::Offline;
            let cancel = record.pending_demotion != 0;
            record.pending_demotion = 0;
            record.touch(now);
            (was_connected, cancel)
        };

        ApplyOutcome {
            event: was_connected.then(|| {
                self.make_event(
                    PresenceEventKind::WentOffline,
                    user.clone(),
                    PresenceStatus::Offline,
                    0,
                    self.node_id.clone(),
                )
            }),
            status_changed: was_connected,
            timer: cancel.then(|| TimerAction::Cancel { user }),
            duplicate: false,
        }
    }

    fn apply_grace_expired(&self, user: UserId, epoch: u64) -> ApplyOutcome {
        let now = Utc::now();
        {
            let mut guard = self.lock_shard(&user);
            let Some(record) = guard.get_mut(&user) else {
                return ApplyOutcome::noop();
            };
            if record.pending_demotion != epoch {
                // A reconnect or newer disconnect superseded this timer.
                return ApplyOutcome::noop();
            }
            record.pending_demotion = 0;

            let effective = record.effective_count(|n| self.trusts(n));
            if effective > 0 || record.status == PresenceStatus::Offline {
                return ApplyOutcome::noop();
            }
            record.status = PresenceStatus::Offline;
            record.touch(now);
        }

        ApplyOutcome {
            event: Some(self.make_event(
                PresenceEventKind::WentOffline,
                user,
                PresenceStatus::Offline,
                0,
                self.node_id.clone(),
            )),
            status_changed: true,
            timer: None,
            duplicate: false,
        }
    }

    fn apply_mirror(&self, event: PresenceEvent) -> ApplyOutcome {
        if !self.dedup.observe(&event.correlation_id.to_string()) {
            return ApplyOutcome::duplicate();
        }

        let (status_changed, cancel) = {
            let mut guard = self.lock_shard(&event.user_id);
            let record = guard.entry(event.user_id.clone()).or_default();
            let old_status = record.status;

            if event.connection_count == 0 {
                record.counts.remove(&event.source_node_id);
            } else {
                record
                    .counts
                    .insert(event.source_node_id.clone(), event.connection_count);
            }
            if event.kind == PresenceEventKind::Connected {
                record.owner_node_id = Some(event.source_node_id.clone());
            }
            record.touch(event.timestamp);

            match event.status {
                // Online signals merge by OR: any node reporting online
                // wins over a stale local view.
                PresenceStatus::Online => record.status = PresenceStatus::Online,
                PresenceStatus::Away => {
                    if record.effective_count(|n| self.trusts(n)) > 0 {
                        record.status = PresenceStatus::Away;
                    }
                }
                // The source asserts a user-level offline (logout, grace
                // expiry, dead-node discount): drop every contribution we
                // only know second-hand and keep what this node sees
                // directly. A racing connect elsewhere re-adds its count
                // with a later event.
                PresenceStatus::Offline => {
                    record.counts.retain(|node, _| *node == self.node_id);
                    if record.effective_count(|n| self.trusts(n)) == 0 {
                        record.status = PresenceStatus::Offline;
                    }
                }
            }

            let mut cancel = false;
            if record.pending_demotion != 0
                && record.effective_count(|n| self.trusts(n)) > 0
            {
                // The user reconnected elsewhere; our grace timer is moot.
                record.pending_demotion = 0;
                cancel = true;
            }
            (old_status != record.status, cancel)
        };

        ApplyOutcome {
            event: None,
            status_changed,
            timer: cancel.then(|| TimerAction::Cancel {
                user: event.user_id.clone(),
            }),
            duplicate: false,
        }
    }

    /// Discount a dead node: zero its contribution in every record and
    /// demote users left with no connections, bypassing grace timers (a
    /// crashed node cannot emit graceful disconnects).
    pub fn apply_node_down(&self, node: &NodeId) -> Vec<PresenceEvent> {
        let now = Utc::now();
        let mut events = Vec::new();
        for shard in &self.shards {
            let mut guard = shard.lock().unwrap_or_else(|e| e.into_inner());
            for (user, record) in guard.iter_mut() {
                if record.counts.remove(node).is_none() {
                    continue;
                }
                let effective = record.effective_count(|n| self.trusts(n));
                if effective == 0 && record.status != PresenceStatus::Offline {
                    record.status = PresenceStatus::Offline;
                    record.pending_demotion = 0;
                    record.touch(now);
                    events.push(self.make_event(
                        PresenceEventKind::WentOffline,
                        user.clone(),
                        PresenceStatus::Offline,
                        0,
                        self.node_id.clone(),
                    ));
                }
            }
        }
        events
    }

    /// Read-only status view; `None` means the cluster has no record.
    pub fn snapshot(&self, user: &UserId) -> Option<PresenceSnapshot> {
        let guard = self.lock_shard(user);
        guard.get(user).map(|record| PresenceSnapshot {
            status: record.status,
            last_seen_at: record.last_seen_at,
        })
    }

    /// Total resident records.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    /// Whether no records are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict idle offline records oldest-first until the registry is
    /// back under its configured bound. Returns the eviction count.
    pub fn evict_excess(&self) -> usize {
        let total = self.len();
        if total <= self.max_records {
            return 0;
        }
        let excess = total - self.max_records;

        let mut candidates: Vec<(UserId, chrono::DateTime<Utc>)> = Vec::new();
        for shard in &self.shards {
            let guard = shard.lock().unwrap_or_else(|e| e.into_inner());
            for (user, record) in guard.iter() {
                if record.is_idle() {
                    candidates.push((user.clone(), record.last_seen_at));
                }
            }
        }
        candidates.sort_by_key(|(_, last_seen)| *last_seen);

        let mut evicted = 0;
        for (user, _) in candidates.into_iter().take(excess) {
            let mut guard = self.lock_shard(&user);
            // Re-check under the lock; the record may have woken up.
            if guard.get(&user).is_some_and(PresenceRecord::is_idle) {
                guard.remove(&user);
                evicted += 1;
            }
        }
        evicted
    }

    fn lock_shard(&self, user: &UserId) -> std::sync::MutexGuard<'_, HashMap<UserId, PresenceRecord>> {
        self.shard(user).lock().unwrap_or_else(|e| e.into_inner())
    }
}
