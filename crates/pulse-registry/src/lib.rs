//! # pulse-registry
//!
//! The presence core: per-user records sharded across fine-grained
//! locks, a single transition function applied to every event regardless
//! of origin, a correlation-id de-duplication window, the grace-period
//! reaper, and the [`service::PresenceService`] that composes registry,
//! backplane, event log, and local fanout.

pub mod dedup;
pub mod metrics;
pub mod reaper;
pub mod record;
pub mod registry;
pub mod service;

pub use metrics::PresenceMetrics;
pub use reaper::{ReaperHandle, run_reaper};
pub use record::PresenceRecord;
pub use registry::{ApplyOutcome, PresenceRegistry, TimerAction, Transition};
pub use service::PresenceService;
