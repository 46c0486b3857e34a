//! The durable state document

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use siteward_api::SessionKind;
use siteward_util::{DayKey, GroupId, RollingWindow, SessionKey};
use std::collections::HashMap;

/// Current version of the persisted state document
pub const STATE_SCHEMA_VERSION: u32 = 2;

/// The root durable object.
///
/// Usage records are not part of this document; they live in their own
/// table and are written additively (see `Store::add_usage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub schema_version: u32,

    /// Temporary-access sessions by key
    #[serde(default)]
    pub sessions: HashMap<SessionKey, SessionRecord>,

    /// Visit timestamps per rate-limited group
    #[serde(default)]
    pub quota_windows: HashMap<GroupId, RollingWindow>,

    /// Counters scoped to the current local calendar day
    pub day_counters: DayCounters,

    pub last_saved: Option<DateTime<Local>>,
}

impl PersistedState {
    pub fn empty(now: DateTime<Local>) -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            sessions: HashMap::new(),
            quota_windows: HashMap::new(),
            day_counters: DayCounters::new(DayKey::for_datetime(now)),
            last_saved: None,
        }
    }
}

/// A temporary-access session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub kind: SessionKind,
    pub started_at: DateTime<Local>,
    pub expires_at: DateTime<Local>,
}

impl SessionRecord {
    /// A session landing exactly on its expiry is already dead
    pub fn is_live(&self, now: DateTime<Local>) -> bool {
        self.expires_at > now
    }
}

/// Daily counters, reset at local midnight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayCounters {
    pub day: DayKey,

    /// First work-hours access per group (anchors the daily allowance)
    #[serde(default)]
    pub first_access: HashMap<GroupId, DateTime<Local>>,

    /// Lunch sessions consumed per group
    #[serde(default)]
    pub lunch_used: HashMap<GroupId, u32>,
}

impl DayCounters {
    pub fn new(day: DayKey) -> Self {
        Self {
            day,
            first_access: HashMap::new(),
            lunch_used: HashMap::new(),
        }
    }
}
