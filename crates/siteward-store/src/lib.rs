//! Persistence layer for sitewardd
//!
//! Provides:
//! - Versioned state document (sessions, quota windows, day counters)
//!   with migration of legacy shapes at load
//! - Additive usage accounting (per host/day)
//! - Audit log (append-only)
//!
//! This crate exclusively owns the on-disk representation; everything else
//! operates on the in-memory mirror and routes mutations through a save.

mod audit;
mod migrate;
mod sqlite;
mod state;
mod traits;

pub use audit::*;
pub use migrate::*;
pub use sqlite::*;
pub use state::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persisted state failed validation; nothing will be written over it
    #[error("Corrupt persisted state: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for siteward_util::WardError {
    fn from(e: StoreError) -> Self {
        siteward_util::WardError::StoreError(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
