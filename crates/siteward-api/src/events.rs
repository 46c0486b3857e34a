//! Event types for sitewardd -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use siteward_util::{DayKey, SessionKey};

use crate::{API_VERSION, SessionKind};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: siteward_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A temporary-access session was granted
    SessionStarted {
        key: SessionKey,
        kind: SessionKind,
        expires_at: DateTime<Local>,
        /// Hosts the grant covers (one for host-scoped, all group domains
        /// for group-scoped sessions)
        hosts: Vec<String>,
    },

    /// A session expired; observers of these hosts should re-enforce
    SessionExpired {
        key: SessionKey,
        kind: SessionKind,
        hosts: Vec<String>,
    },

    /// The daily rollover completed; day-scoped counters are fresh
    RolloverCompleted { day: DayKey },

    /// Saves have failed past the retry limit
    StoreDegraded { failures: u32 },

    /// A save succeeded after the store had been degraded
    StoreRecovered,

    /// Service is shutting down
    Shutdown,
}
