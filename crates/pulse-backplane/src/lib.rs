//! # pulse-backplane
//!
//! Pub/sub backplane implementations behind the
//! [`Backplane`](pulse_core::traits::backplane::Backplane) seam:
//!
//! - [`RedisBackplane`]: multi-node fanout over Redis pub/sub with
//!   reconnecting subscriber loops
//! - [`MemoryBackplane`]: in-process fanout for single-node runs and
//!   tests

pub mod memory_pubsub;
pub mod redis_pubsub;

pub use memory_pubsub::MemoryBackplane;
pub use redis_pubsub::RedisBackplane;
