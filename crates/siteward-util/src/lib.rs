//! Shared utilities for sitewardd
//!
//! This crate provides:
//! - ID types (GroupId, SessionKey, ClientId)
//! - Time utilities (wall-clock windows, day keys, duration helpers)
//! - Error types
//! - Rolling-window counters (visit quotas, request limiting)
//! - Default paths for socket, data, and log directories

mod error;
mod ids;
mod paths;
mod rolling;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rolling::*;
pub use time::*;
