//! Core events emitted by the engine

use chrono::{DateTime, Local};
use siteward_api::SessionKind;
use siteward_util::{DayKey, SessionKey};

/// Events emitted by the core engine, broadcast to clients by the daemon
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// A temporary-access session was granted
    SessionStarted {
        key: SessionKey,
        kind: SessionKind,
        expires_at: DateTime<Local>,
        hosts: Vec<String>,
    },

    /// A session expired; observers of these hosts should re-enforce
    SessionExpired {
        key: SessionKey,
        kind: SessionKind,
        hosts: Vec<String>,
    },

    /// The daily rollover completed
    RolloverCompleted { day: DayKey },

    /// Save retries exhausted; the store is degraded
    StoreDegraded { failures: u32 },

    /// A save succeeded after degradation
    StoreRecovered,
}
