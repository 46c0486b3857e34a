//! The in-memory state mirror

use chrono::{DateTime, Local};
use siteward_store::{DayCounters, PersistedState, STATE_SCHEMA_VERSION, SessionRecord};
use siteward_util::{DayKey, GroupId, RollingWindow, SessionKey};
use std::collections::HashMap;

/// In-memory mirror of the durable state.
///
/// The engine is the single writer; every mutation is followed by a save
/// through the store. Reads treat a session at or past its expiry as absent
/// even if not yet purged.
#[derive(Debug)]
pub struct EngineState {
    pub sessions: HashMap<SessionKey, SessionRecord>,
    pub quota_windows: HashMap<GroupId, RollingWindow>,
    pub day_counters: DayCounters,
}

impl EngineState {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            sessions: HashMap::new(),
            quota_windows: HashMap::new(),
            day_counters: DayCounters::new(DayKey::for_datetime(now)),
        }
    }

    pub fn from_persisted(state: PersistedState) -> Self {
        Self {
            sessions: state.sessions,
            quota_windows: state.quota_windows,
            day_counters: state.day_counters,
        }
    }

    pub fn to_persisted(&self, now: DateTime<Local>) -> PersistedState {
        PersistedState {
            schema_version: STATE_SCHEMA_VERSION,
            sessions: self.sessions.clone(),
            quota_windows: self.quota_windows.clone(),
            day_counters: self.day_counters.clone(),
            last_saved: Some(now),
        }
    }

    /// Session under `key` that is still live at `now`
    pub fn live_session(&self, key: &SessionKey, now: DateTime<Local>) -> Option<&SessionRecord> {
        self.sessions.get(key).filter(|s| s.is_live(now))
    }

    /// Remove every dead session, returning what was purged
    pub fn sweep_expired(&mut self, now: DateTime<Local>) -> Vec<(SessionKey, SessionRecord)> {
        let dead: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|(_, s)| !s.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();

        dead.into_iter()
            .filter_map(|key| self.sessions.remove(&key).map(|s| (key, s)))
            .collect()
    }

    /// Reset day-scoped counters when the local calendar day has moved on.
    /// Returns the new day when a reset happened. Restarting mid-day keeps
    /// the persisted counters.
    pub fn ensure_day(&mut self, now: DateTime<Local>) -> Option<DayKey> {
        let today = DayKey::for_datetime(now);
        if self.day_counters.day == today {
            return None;
        }

        self.day_counters = DayCounters::new(today);
        Some(today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use siteward_api::SessionKind;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn session(start: DateTime<Local>, expires: DateTime<Local>) -> SessionRecord {
        SessionRecord {
            kind: SessionKind::Grace,
            started_at: start,
            expires_at: expires,
        }
    }

    #[test]
    fn dead_sessions_are_absent_on_read() {
        let mut state = EngineState::new(at(10, 0));
        let key = SessionKey::for_host("reddit.com");
        state.sessions.insert(key.clone(), session(at(10, 0), at(10, 5)));

        assert!(state.live_session(&key, at(10, 4)).is_some());
        // Exactly at expiry is expired
        assert!(state.live_session(&key, at(10, 5)).is_none());
        // Still physically present until swept
        assert!(state.sessions.contains_key(&key));
    }

    #[test]
    fn sweep_removes_only_dead_sessions() {
        let mut state = EngineState::new(at(10, 0));
        state.sessions.insert(
            SessionKey::for_host("a.com"),
            session(at(9, 0), at(9, 30)),
        );
        state.sessions.insert(
            SessionKey::for_host("b.com"),
            session(at(10, 0), at(11, 0)),
        );

        let purged = state.sweep_expired(at(10, 0));
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].0, SessionKey::for_host("a.com"));
        assert_eq!(state.sessions.len(), 1);
    }

    #[test]
    fn same_day_restart_keeps_counters() {
        let mut state = EngineState::new(at(9, 0));
        state
            .day_counters
            .lunch_used
            .insert(GroupId::new("streaming"), 1);

        assert!(state.ensure_day(at(18, 0)).is_none());
        assert_eq!(state.day_counters.lunch_used.len(), 1);
    }

    #[test]
    fn stale_day_resets_counters() {
        let mut state = EngineState::new(at(9, 0));
        state
            .day_counters
            .lunch_used
            .insert(GroupId::new("streaming"), 2);

        let next_day = Local.with_ymd_and_hms(2026, 3, 3, 0, 0, 1).unwrap();
        let rolled = state.ensure_day(next_day);
        assert_eq!(rolled.unwrap().to_string(), "2026-03-03");
        assert!(state.day_counters.lunch_used.is_empty());
        assert!(state.day_counters.first_access.is_empty());
    }
}
