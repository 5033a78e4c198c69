//! # pulse-gateway
//!
//! The realtime edge of Pulse:
//!
//! - JWT gatekeeping for inbound WebSocket connections
//! - Connection handles, pooling, and per-user caps
//! - Channel subscriptions and local presence fanout
//! - Client keepalive (app-level ping/pong)
//! - The axum WebSocket endpoint

pub mod authenticator;
pub mod channels;
pub mod fanout;
pub mod frames;
pub mod handle;
pub mod keepalive;
pub mod manager;
pub mod metrics;
pub mod pool;
pub mod ws;

pub use authenticator::{AcceptedConnection, ConnectRequest, Gatekeeper, TokenVerifier};
pub use fanout::LocalFanout;
pub use manager::ConnectionManager;
pub use metrics::GatewayMetrics;
pub use ws::{GatewayState, ws_handler};
