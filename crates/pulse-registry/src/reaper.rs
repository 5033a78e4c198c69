//! Grace-period reaper.
//!
//! Timers are per-user, not per-connection: a burst of disconnects
//! collapses to a single timer governed by the most recent one. On
//! expiry the reaper routes the demotion back through the registry
//! service, which re-checks effective cluster-wide status before
//! publishing anything.

use std::collections::HashMap;
use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::time::DelayQueue;
use tracing::debug;

use pulse_core::types::id::UserId;

use crate::service::PresenceService;

/// Commands accepted by the reaper task.
#[derive(Debug)]
pub enum ReaperCommand {
    /// Schedule (or reset) the demotion timer for a user.
    Schedule {
        /// The user to demote on expiry.
        user: UserId,
        /// Epoch guarding against stale expiries.
        epoch: u64,
    },
    /// Cancel a pending timer.
    Cancel {
        /// The user whose timer is void.
        user: UserId,
    },
}

/// Cheap cloneable handle for scheduling and cancelling demotions.
#[derive(Debug, Clone)]
pub struct ReaperHandle {
    tx: mpsc::UnboundedSender<ReaperCommand>,
}

impl ReaperHandle {
    /// Schedule (or reset) a demotion for `user`.
    pub fn schedule(&self, user: UserId, epoch: u64) {
        let _ = self.tx.send(ReaperCommand::Schedule { user, epoch });
    }

    /// Cancel any pending demotion for `user`.
    pub fn cancel(&self, user: UserId) {
        let _ = self.tx.send(ReaperCommand::Cancel { user });
    }
}

/// Create the reaper command channel.
pub fn reaper_channel() -> (ReaperHandle, mpsc::UnboundedReceiver<ReaperCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReaperHandle { tx }, rx)
}

/// Run the reaper until shutdown.
pub async fn run_reaper(
    mut rx: mpsc::UnboundedReceiver<ReaperCommand>,
    service: Arc<PresenceService>,
    grace: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    let mut queue: DelayQueue<(UserId, u64)> = DelayQueue::new();
    let mut keys: HashMap<UserId, tokio_util::time::delay_queue::Key> = HashMap::new();

    loop {
        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(ReaperCommand::Schedule { user, epoch }) => {
                        // Replace any existing timer: the latest
                        // disconnect governs the single per-user window.
                        if let Some(key) = keys.remove(&user) {
                            queue.remove(&key);
                        }
                        let key = queue.insert((user.clone(), epoch), grace);
                        keys.insert(user, key);
                    }
                    Some(ReaperCommand::Cancel { user }) => {
                        if let Some(key) = keys.remove(&user) {
                            queue.remove(&key);
                        }
                    }
                    None => return,
                }
            }
            expired = poll_fn(|cx| queue.poll_expired(cx)), if !keys.is_empty() => {
                let Some(expired) = expired else { continue };
                let (user, epoch) = expired.into_inner();
                keys.remove(&user);
                debug!(user = %user, "Grace window elapsed");
                service.handle_grace_expiry(user, epoch).await;
            }
            _ = shutdown.changed() => {
                debug!("Reaper stopping");
                return;
            }
        }
    }
}
