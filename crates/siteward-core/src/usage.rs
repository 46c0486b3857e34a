//! Per-domain usage accumulation

use chrono::{DateTime, Local, Timelike};
use siteward_api::UsageRecord;
use siteward_store::UsageDelta;
use siteward_util::DayKey;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Accumulates active time per host for the current day.
///
/// Mutations land in both the in-memory day records (served to readers) and
/// a pending-delta map keyed by day. Pending deltas survive failed flushes:
/// they stay queued for the next attempt instead of being dropped, and they
/// stay attributed to the day they happened on even across a rollover.
pub struct UsageLedger {
    day: DayKey,
    view_timeout: Duration,
    day_start_hour: u8,
    records: HashMap<String, UsageRecord>,
    pending: HashMap<(DayKey, String), UsageDelta>,
    last_seen: HashMap<String, DateTime<Local>>,
}

impl UsageLedger {
    pub fn new(day: DayKey, view_timeout: Duration, day_start_hour: u8) -> Self {
        Self {
            day,
            view_timeout,
            day_start_hour,
            records: HashMap::new(),
            pending: HashMap::new(),
            last_seen: HashMap::new(),
        }
    }

    pub fn day(&self) -> DayKey {
        self.day
    }

    /// Install the already-persisted records for the current day (startup)
    pub fn seed(&mut self, records: HashMap<String, UsageRecord>) {
        self.records = records;
    }

    /// Today's records, pending deltas included
    pub fn today(&self) -> &HashMap<String, UsageRecord> {
        &self.records
    }

    pub fn usage_today_ms(&self, host: &str) -> u64 {
        self.records.get(host).map(|r| r.time_ms).unwrap_or(0)
    }

    /// Add `delta` of active time for `host`.
    ///
    /// A new view session is counted when nothing was recorded for the host
    /// within the inactivity timeout. The first-access timestamp is only set
    /// after the configured day-start hour, so pre-dawn activity does not
    /// count as the day's first access. Rapid successive calls accumulate
    /// additively.
    pub fn record_usage(&mut self, host: &str, delta: Duration, now: DateTime<Local>) {
        let delta_ms = delta.as_millis() as u64;

        let new_view = self
            .last_seen
            .get(host)
            .is_none_or(|last| siteward_util::elapsed_since(*last, now) > self.view_timeout);
        self.last_seen.insert(host.to_string(), now);

        let record = self.records.entry(host.to_string()).or_default();
        record.time_ms += delta_ms;
        if new_view {
            record.views += 1;
        }

        let mut first_access = None;
        if record.first_access.is_none() && now.hour() >= self.day_start_hour as u32 {
            record.first_access = Some(now);
            first_access = Some(now);
        }
        record.last_access = Some(now);

        let pending = self
            .pending
            .entry((self.day, host.to_string()))
            .or_default();
        pending.merge(&UsageDelta {
            time_ms: delta_ms,
            views: new_view as u32,
            temp_access: 0,
            first_access,
            last_access: Some(now),
        });

        debug!(
            host,
            added_ms = delta_ms,
            new_view,
            total_ms = record.time_ms,
            "Usage recorded"
        );
    }

    /// Count a temporary-access request for `host`. Returns the host's
    /// count for today, including this one.
    pub fn record_temp_access(&mut self, host: &str, now: DateTime<Local>) -> u32 {
        let record = self.records.entry(host.to_string()).or_default();
        record.temp_access_requests += 1;
        record.last_access = Some(now);

        let pending = self
            .pending
            .entry((self.day, host.to_string()))
            .or_default();
        pending.merge(&UsageDelta {
            temp_access: 1,
            last_access: Some(now),
            ..Default::default()
        });

        record.temp_access_requests
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the pending deltas for a flush attempt
    pub fn take_pending(&mut self) -> Vec<((DayKey, String), UsageDelta)> {
        self.pending.drain().collect()
    }

    /// Put unflushed deltas back after a failed save
    pub fn restore_pending(&mut self, items: Vec<((DayKey, String), UsageDelta)>) {
        for (key, delta) in items {
            self.pending.entry(key).or_default().merge(&delta);
        }
    }

    /// Start a fresh day. The finished day's records have been flushed (or
    /// remain queued in pending, still keyed to the old day); its in-memory
    /// records become the store's responsibility.
    pub fn begin_day(&mut self, day: DayKey) {
        self.day = day;
        self.records.clear();
        self.last_seen.clear();
    }
}
