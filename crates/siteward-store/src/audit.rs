//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use siteward_api::SessionKind;
use siteward_util::{DayKey, SessionKey};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Policy table loaded
    PolicyLoaded { group_count: usize },

    /// State document loaded
    StateLoaded {
        schema_version: u32,
        live_sessions: usize,
    },

    /// State document upgraded from an older schema
    StateMigrated { from: u32, to: u32 },

    /// Startup sweep removed dead sessions
    ExpiredSessionsPurged { count: usize },

    /// Temporary-access session granted
    SessionStarted {
        key: SessionKey,
        kind: SessionKind,
        expires_at: DateTime<Local>,
    },

    /// Session expired
    SessionExpired { key: SessionKey },

    /// Access denied
    AccessDenied { host: String, reason: String },

    /// Daily rollover completed
    RolloverCompleted { day: DayKey },

    /// A save attempt failed
    SaveFailed { attempt: u32, error: String },

    /// Save retries exhausted
    StoreDegraded { failures: u32 },

    /// A save succeeded after degradation
    StoreRecovered,
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: siteward_util::now(),
            event,
        }
    }
}
