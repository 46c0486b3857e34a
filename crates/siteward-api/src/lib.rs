//! Protocol types for sitewardd IPC
//!
//! This crate defines the stable API between sitewardd and its clients
//! (blocking pages, content scripts, status UIs):
//! - Commands (requests from clients)
//! - Responses, including access decisions
//! - Events (service -> clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
