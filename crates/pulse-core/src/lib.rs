//! # pulse-core
//!
//! Foundation crate for the Pulse presence platform. Provides:
//!
//! - Configuration schemas loaded from TOML + environment
//! - The unified [`error::AppError`] type and [`result::AppResult`] alias
//! - Identifier newtypes ([`types::id::UserId`], [`types::id::NodeId`])
//! - Presence domain events and upstream log message shapes
//! - Trait seams (backplane, event log, fanout) implemented by the
//!   transport crates and by in-memory doubles in tests

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
