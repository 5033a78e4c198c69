//! Domain events: presence transitions, upstream log messages, and
//! cluster heartbeats.

pub mod cluster;
pub mod log;
pub mod presence;

pub use cluster::Heartbeat;
pub use log::UpstreamEvent;
pub use presence::{PresenceEvent, PresenceEventKind, PresenceStatus, PublishedPresence};
