//! Versioned migration of the persisted state document
//!
//! Older installations stored usage records inside the state document, and
//! before that as bare millisecond counts per host. Migration runs once at
//! load and produces the single canonical shape; steady-state code never
//! sees a legacy form.

use chrono::{DateTime, Local};
use serde::Deserialize;
use siteward_api::UsageRecord;
use siteward_util::{DayKey, GroupId, RollingWindow, SessionKey};
use std::collections::HashMap;
use tracing::info;

use crate::{
    DayCounters, PersistedState, STATE_SCHEMA_VERSION, SessionRecord, StoreError, StoreResult,
};

/// Result of migrating a raw document
#[derive(Debug)]
pub struct MigrationOutcome {
    pub state: PersistedState,

    /// Usage extracted from a legacy document, to be folded into the usage
    /// table by the caller
    pub legacy_usage: Vec<(DayKey, String, UsageRecord)>,

    /// Version the document was migrated from, if it was not current
    pub migrated_from: Option<u32>,
}

/// A tolerant view of any supported document version.
///
/// Version 1 documents carry `usage` inline and may omit `schema_version`;
/// version 2 documents match `PersistedState`.
#[derive(Debug, Deserialize)]
struct RawDocument {
    schema_version: Option<u32>,

    #[serde(default)]
    sessions: HashMap<SessionKey, SessionRecord>,

    #[serde(default)]
    quota_windows: HashMap<GroupId, RollingWindow>,

    day_counters: Option<DayCounters>,

    last_saved: Option<DateTime<Local>>,

    /// v1 only: `{day: {host: millis-or-record}}`
    usage: Option<HashMap<String, HashMap<String, serde_json::Value>>>,
}

/// Upgrade a raw JSON document to the current schema.
///
/// A missing or unrecognized `schema_version` is treated as the oldest
/// supported version. A document that fails to parse at all is surfaced as
/// [`StoreError::Corrupt`] and must not be overwritten.
pub fn migrate_state(
    doc: serde_json::Value,
    now: DateTime<Local>,
) -> StoreResult<MigrationOutcome> {
    let raw: RawDocument = serde_json::from_value(doc)
        .map_err(|e| StoreError::Corrupt(format!("state document does not parse: {}", e)))?;

    let version = match raw.schema_version {
        Some(v) if v == STATE_SCHEMA_VERSION => STATE_SCHEMA_VERSION,
        Some(v) => {
            info!(found = v, "Unrecognized state version, treating as oldest");
            1
        }
        None => 1,
    };

    let mut legacy_usage = Vec::new();
    if version < STATE_SCHEMA_VERSION {
        if let Some(usage) = raw.usage {
            for (day_str, hosts) in usage {
                let day: DayKey = day_str.parse().map_err(|_| {
                    StoreError::Corrupt(format!("invalid usage day key '{}'", day_str))
                })?;
                for (host, value) in hosts {
                    legacy_usage.push((day, host, convert_legacy_usage(value)?));
                }
            }
        }
    }

    let state = PersistedState {
        schema_version: STATE_SCHEMA_VERSION,
        sessions: raw.sessions,
        quota_windows: raw.quota_windows,
        day_counters: raw
            .day_counters
            .unwrap_or_else(|| DayCounters::new(DayKey::for_datetime(now))),
        last_saved: raw.last_saved,
    };

    let migrated_from = (version < STATE_SCHEMA_VERSION).then_some(version);
    if let Some(from) = migrated_from {
        info!(
            from,
            to = STATE_SCHEMA_VERSION,
            legacy_usage_records = legacy_usage.len(),
            "State document migrated"
        );
    }

    Ok(MigrationOutcome {
        state,
        legacy_usage,
        migrated_from,
    })
}

/// v1 usage values were either a bare millisecond count or an early form of
/// the structured record
fn convert_legacy_usage(value: serde_json::Value) -> StoreResult<UsageRecord> {
    match value {
        serde_json::Value::Number(n) => {
            let time_ms = n
                .as_u64()
                .ok_or_else(|| StoreError::Corrupt(format!("negative usage count: {}", n)))?;
            Ok(UsageRecord {
                time_ms,
                ..Default::default()
            })
        }
        value @ serde_json::Value::Object(_) => serde_json::from_value(value)
            .map_err(|e| StoreError::Corrupt(format!("unreadable usage record: {}", e))),
        other => Err(StoreError::Corrupt(format!(
            "usage entry is neither a count nor a record: {}",
            other
        ))),
    }
}
