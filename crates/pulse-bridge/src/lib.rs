//! # pulse-bridge
//!
//! Bridges between the presence core and the platform's event fabric:
//!
//! - [`ingest::run_ingest`]: consumer-group ingestion of upstream
//!   topics into the registry
//! - [`redis_log::RedisEventLog`]: Redis Streams producer/consumer
//! - [`memory_log::MemoryEventLog`]: in-process double for single-node
//!   runs and tests
//! - [`dispatch::run_backplane_dispatcher`]: routes backplane traffic
//!   (heartbeats, mirrored presence events) to membership and registry

pub mod dispatch;
pub mod ingest;
pub mod memory_log;
pub mod redis_log;

pub use memory_log::MemoryEventLog;
pub use redis_log::RedisEventLog;
