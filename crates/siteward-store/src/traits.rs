//! Store trait definitions

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use siteward_api::UsageRecord;
use siteward_util::DayKey;
use std::collections::HashMap;

use crate::{AuditEvent, PersistedState, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // State document

    /// Load the state document, migrating legacy shapes to the current
    /// schema. `None` on first run.
    fn load_state(&self) -> StoreResult<Option<LoadedState>>;

    /// Save the state document
    fn save_state(&self, state: &PersistedState) -> StoreResult<()>;

    // Usage accounting

    /// Apply an additive delta to the record for (day, host)
    fn add_usage(&self, day: DayKey, host: &str, delta: &UsageDelta) -> StoreResult<()>;

    /// All usage records for a day
    fn usage_for_day(&self, day: DayKey) -> StoreResult<HashMap<String, UsageRecord>>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if the store is healthy
    fn is_healthy(&self) -> bool;
}

/// State returned from `load_state`
#[derive(Debug)]
pub struct LoadedState {
    pub state: PersistedState,
    /// Set when the on-disk document was upgraded during this load
    pub migrated_from: Option<u32>,
}

/// Additive change to a usage record.
///
/// Counters add; `first_access` keeps the earliest value ever written,
/// `last_access` the latest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub time_ms: u64,
    pub views: u32,
    pub temp_access: u32,
    pub first_access: Option<DateTime<Local>>,
    pub last_access: Option<DateTime<Local>>,
}

impl UsageDelta {
    pub fn is_empty(&self) -> bool {
        self.time_ms == 0
            && self.views == 0
            && self.temp_access == 0
            && self.first_access.is_none()
            && self.last_access.is_none()
    }

    /// Fold another delta into this one
    pub fn merge(&mut self, other: &UsageDelta) {
        self.time_ms += other.time_ms;
        self.views += other.views;
        self.temp_access += other.temp_access;

        self.first_access = match (self.first_access, other.first_access) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.last_access = match (self.last_access, other.last_access) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

impl From<&UsageRecord> for UsageDelta {
    fn from(record: &UsageRecord) -> Self {
        Self {
            time_ms: record.time_ms,
            views: record.views,
            temp_access: record.temp_access_requests,
            first_access: record.first_access,
            last_access: record.last_access,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn merge_is_additive() {
        let t1 = Local.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let t2 = Local.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();

        let mut a = UsageDelta {
            time_ms: 5000,
            views: 1,
            temp_access: 0,
            first_access: Some(t2),
            last_access: Some(t2),
        };
        let b = UsageDelta {
            time_ms: 3000,
            views: 0,
            temp_access: 1,
            first_access: Some(t1),
            last_access: Some(t1),
        };

        a.merge(&b);
        assert_eq!(a.time_ms, 8000);
        assert_eq!(a.views, 1);
        assert_eq!(a.temp_access, 1);
        assert_eq!(a.first_access, Some(t1));
        assert_eq!(a.last_access, Some(t2));
    }
}
