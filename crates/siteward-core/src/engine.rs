//! The engine facade

use chrono::{DateTime, Local};
use siteward_api::{Decision, HealthStatus, SessionGrant, SessionKind, SiteInfo, UsageRecord};
use siteward_config::{Policy, Rule};
use siteward_store::{AuditEvent, AuditEventType, Store, StoreError};
use siteward_util::{
    DayKey, GroupId, SessionKey, WardError, elapsed_since, next_local_midnight, remaining_until,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    AlarmClock, AlarmKind, CoreEvent, DomainResolver, EngineState, SessionManager, UsageLedger,
    evaluate, normalize_host,
};

type WardResult<T> = Result<T, WardError>;

/// The access-policy engine.
///
/// Owns the in-memory state mirror and is its single writer; every mutation
/// is followed by a save through the store. Emitted [`CoreEvent`]s are
/// queued until the daemon drains them with [`WardEngine::take_events`].
pub struct WardEngine {
    policy: Policy,
    resolver: DomainResolver,
    store: Arc<dyn Store>,
    sessions: SessionManager,
    state: EngineState,
    usage: UsageLedger,
    alarms: Arc<dyn AlarmClock>,
    pending_events: Vec<CoreEvent>,
    save_in_flight: bool,
    save_pending: bool,
    save_failures: u32,
    degraded: bool,
    last_autosave: DateTime<Local>,
}

impl WardEngine {
    /// Load state, migrate, sweep expired sessions, and arm the alarms.
    ///
    /// Requests must not be served before this completes. A corrupt state
    /// document is surfaced as an error and left untouched on disk.
    pub fn bootstrap(
        policy: Policy,
        store: Arc<dyn Store>,
        alarms: Arc<dyn AlarmClock>,
        now: DateTime<Local>,
    ) -> WardResult<Self> {
        let resolver = DomainResolver::from_policy(&policy);
        let sessions = SessionManager::new(alarms.clone());

        let mut state = match store.load_state()? {
            Some(loaded) => {
                let _ = store.append_audit(AuditEvent::new(AuditEventType::StateLoaded {
                    schema_version: loaded.state.schema_version,
                    live_sessions: loaded
                        .state
                        .sessions
                        .values()
                        .filter(|s| s.is_live(now))
                        .count(),
                }));
                if let Some(from) = loaded.migrated_from {
                    let _ = store.append_audit(AuditEvent::new(AuditEventType::StateMigrated {
                        from,
                        to: siteward_store::STATE_SCHEMA_VERSION,
                    }));
                }
                EngineState::from_persisted(loaded.state)
            }
            None => EngineState::new(now),
        };

        // Crash recovery: a persisted session past its expiry must not come
        // back to life
        let purged = sessions.sweep(&mut state, now);
        if !purged.is_empty() {
            info!(count = purged.len(), "Purged expired sessions at startup");
            let _ = store.append_audit(AuditEvent::new(AuditEventType::ExpiredSessionsPurged {
                count: purged.len(),
            }));
        }

        state.ensure_day(now);

        let today = DayKey::for_datetime(now);
        let mut usage = UsageLedger::new(
            today,
            policy.service.view_timeout,
            policy.service.day_start_hour,
        );
        usage.seed(store.usage_for_day(today)?);

        // Eager callbacks for everything still pending
        for (key, session) in &state.sessions {
            alarms.schedule(AlarmKind::SessionExpiry(key.clone()), session.expires_at);
        }
        alarms.schedule(AlarmKind::Rollover, next_local_midnight(now));

        let _ = store.append_audit(AuditEvent::new(AuditEventType::PolicyLoaded {
            group_count: policy.groups.len(),
        }));
        info!(
            group_count = policy.groups.len(),
            live_sessions = state.sessions.len(),
            "Engine ready"
        );

        let mut engine = Self {
            policy,
            resolver,
            store,
            sessions,
            state,
            usage,
            alarms,
            pending_events: Vec::new(),
            save_in_flight: false,
            save_pending: false,
            save_failures: 0,
            degraded: false,
            last_autosave: now,
        };
        engine.persist(now);
        Ok(engine)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// May `host` be accessed at `now`?
    pub fn check_access(&mut self, host: &str, now: DateTime<Local>) -> Decision {
        self.reconcile_day(now);

        let host = normalize_host(host);
        let Some(group_id) = self.resolver.classify(&host).cloned() else {
            debug!(host, "Unrestricted host");
            return Decision::unconditional();
        };
        let Some(group) = self.policy.get_group(&group_id) else {
            return Decision::unconditional();
        };

        let outcome = evaluate(group, &host, &self.sessions, &mut self.state, now);

        if let Some((key, record)) = &outcome.granted {
            let _ = self.store.append_audit(AuditEvent::new(AuditEventType::SessionStarted {
                key: key.clone(),
                kind: record.kind,
                expires_at: record.expires_at,
            }));
            self.pending_events.push(CoreEvent::SessionStarted {
                key: key.clone(),
                kind: record.kind,
                expires_at: record.expires_at,
                hosts: vec![host.clone()],
            });
        }

        if let Decision::Denied { reason, .. } = &outcome.decision {
            debug!(host, reason = ?reason, "Access denied");
            let _ = self.store.append_audit(AuditEvent::new(AuditEventType::AccessDenied {
                host: host.clone(),
                reason: format!("{:?}", reason),
            }));
        }

        if outcome.dirty {
            self.persist(now);
        }

        outcome.decision
    }

    /// Start (or overwrite) a temporary-access session for `host`.
    ///
    /// The duration defaults from policy for the kind. Idempotent under
    /// retry: the same key simply gets the new expiry.
    pub fn start_session(
        &mut self,
        host: &str,
        kind: SessionKind,
        duration: Option<Duration>,
        now: DateTime<Local>,
    ) -> WardResult<SessionGrant> {
        self.reconcile_day(now);

        let host = normalize_host(host);
        let group_id = self
            .resolver
            .classify(&host)
            .cloned()
            .ok_or_else(|| WardError::UnrestrictedHost(host.clone()))?;
        let group = self.policy.get_group(&group_id).ok_or_else(|| {
            WardError::internal(format!("resolver returned unknown group {}", group_id))
        })?;

        let (key, default_duration) = match kind {
            SessionKind::Grace => (SessionKey::for_host(&host), group.grace),
            SessionKind::Lunch => {
                let lunch = match &group.rule {
                    Rule::WorkHoursAllowance(rule) => rule.lunch.as_ref(),
                    _ => None,
                }
                .ok_or_else(|| {
                    WardError::validation(format!("group '{}' has no lunch sessions", group.id))
                })?;
                (SessionKey::for_group(&group.id), lunch.session)
            }
            SessionKind::QuotaVisit => {
                let Rule::RateLimitedVisits(rule) = &group.rule else {
                    return Err(WardError::validation(format!(
                        "group '{}' has no visit quota",
                        group.id
                    )));
                };
                (SessionKey::for_host(&host), rule.visit)
            }
        };

        let duration = duration.unwrap_or(default_duration);
        if duration.is_zero() {
            return Err(WardError::validation("session duration must be positive"));
        }

        let record = self
            .sessions
            .start(&mut self.state, key.clone(), kind, duration, now);

        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::SessionStarted {
            key: key.clone(),
            kind,
            expires_at: record.expires_at,
        }));
        let hosts = self.hosts_for_key(&key);
        self.pending_events.push(CoreEvent::SessionStarted {
            key: key.clone(),
            kind,
            expires_at: record.expires_at,
            hosts,
        });
        self.persist(now);

        Ok(SessionGrant {
            key,
            kind,
            expires_at: record.expires_at,
        })
    }

    /// Is there a live session under `key`?
    pub fn is_active(&self, key: &SessionKey, now: DateTime<Local>) -> bool {
        self.sessions.is_active(&self.state, key, now)
    }

    /// Record elapsed active time for `host`.
    ///
    /// The delta lands in memory first; a failed flush keeps it queued for
    /// the next attempt while the error is surfaced to the caller.
    pub fn record_usage(&mut self, host: &str, seconds: u64, now: DateTime<Local>) -> WardResult<()> {
        self.reconcile_day(now);

        let host = normalize_host(host);
        if host.is_empty() {
            return Err(WardError::validation("host must not be empty"));
        }

        self.usage
            .record_usage(&host, Duration::from_secs(seconds), now);
        self.flush_usage(now)
    }

    /// Count a temporary-access request for `host`. Returns the count for
    /// today, including this one.
    pub fn record_temp_access(&mut self, host: &str, now: DateTime<Local>) -> WardResult<u32> {
        self.reconcile_day(now);

        let host = normalize_host(host);
        if host.is_empty() {
            return Err(WardError::validation("host must not be empty"));
        }

        let count = self.usage.record_temp_access(&host, now);
        self.flush_usage(now)?;
        Ok(count)
    }

    /// Per-host usage for a day; today is served from memory, archived days
    /// from the store
    pub fn usage_for(&self, day: Option<DayKey>) -> WardResult<(DayKey, HashMap<String, UsageRecord>)> {
        let day = day.unwrap_or(self.usage.day());
        if day == self.usage.day() {
            Ok((day, self.usage.today().clone()))
        } else {
            Ok((day, self.store.usage_for_day(day)?))
        }
    }

    /// Read-only derived status for `host`. Never mutates state.
    pub fn site_info(&self, host: &str, now: DateTime<Local>) -> SiteInfo {
        let host = normalize_host(host);

        let mut info = SiteInfo {
            host: host.clone(),
            group: None,
            label: None,
            rule_summary: None,
            session_remaining: None,
            allowance_remaining: None,
            visits_remaining: None,
            usage_today_ms: self.usage.usage_today_ms(&host),
        };

        let Some(group) = self
            .resolver
            .classify(&host)
            .and_then(|id| self.policy.get_group(id))
        else {
            return info;
        };

        info.group = Some(group.id.clone());
        info.label = Some(group.label.clone());
        info.rule_summary = Some(group.rule.summary());

        for key in [SessionKey::for_host(&host), SessionKey::for_group(&group.id)] {
            if let Some(session) = self.state.live_session(&key, now) {
                info.session_remaining = Some(remaining_until(session.expires_at, now));
                break;
            }
        }

        match &group.rule {
            Rule::AlwaysBlock => {}
            Rule::WorkHoursAllowance(rule) => {
                let remaining = match self.state.day_counters.first_access.get(&group.id) {
                    None => rule.allowance,
                    Some(first) => rule.allowance.saturating_sub(elapsed_since(*first, now)),
                };
                info.allowance_remaining = Some(remaining);
            }
            Rule::RateLimitedVisits(rule) => {
                let used = self
                    .state
                    .quota_windows
                    .get(&group.id)
                    .map(|w| w.live_count(now, rule.window))
                    .unwrap_or(0);
                info.visits_remaining = Some(rule.max_visits.saturating_sub(used as u32));
            }
        }

        info
    }

    /// An alarm fired. Alarms are at-least-once and approximately on time;
    /// every path here re-checks against the clock.
    pub fn handle_alarm(&mut self, alarm: AlarmKind, now: DateTime<Local>) {
        match alarm {
            AlarmKind::SessionExpiry(key) => {
                if let Some(session) = self.sessions.expire_if_due(&mut self.state, &key, now) {
                    let _ = self.store.append_audit(AuditEvent::new(
                        AuditEventType::SessionExpired { key: key.clone() },
                    ));
                    let hosts = self.hosts_for_key(&key);
                    self.pending_events.push(CoreEvent::SessionExpired {
                        key,
                        kind: session.kind,
                        hosts,
                    });
                    self.persist(now);
                }
            }

            AlarmKind::Rollover => {
                self.reconcile_day(now);
                self.alarms
                    .schedule(AlarmKind::Rollover, next_local_midnight(now));
            }

            AlarmKind::SaveRetry => {
                let _ = self.flush_usage(now);
                self.persist(now);
            }
        }
    }

    /// Periodic lazy reconciliation: expire what is due, roll the day over
    /// if midnight was missed, autosave.
    pub fn tick(&mut self, now: DateTime<Local>) {
        let purged = self.sessions.sweep(&mut self.state, now);
        if !purged.is_empty() {
            for (key, session) in purged {
                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::SessionExpired { key: key.clone() },
                ));
                let hosts = self.hosts_for_key(&key);
                self.pending_events.push(CoreEvent::SessionExpired {
                    key,
                    kind: session.kind,
                    hosts,
                });
            }
            self.persist(now);
        }

        self.reconcile_day(now);

        if elapsed_since(self.last_autosave, now) >= self.policy.service.autosave {
            self.last_autosave = now;
            let _ = self.flush_usage(now);
            self.persist(now);
        }
    }

    /// Flush pending usage and save the state document (shutdown path)
    pub fn flush(&mut self, now: DateTime<Local>) {
        let _ = self.flush_usage(now);
        self.persist(now);
    }

    /// Current health, including the persistent degraded flag
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            live: true,
            ready: true,
            policy_loaded: true,
            store_ok: self.store.is_healthy(),
            store_degraded: self.degraded,
        }
    }

    /// Drain queued events for broadcast
    pub fn take_events(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn hosts_for_key(&self, key: &SessionKey) -> Vec<String> {
        if let Some(host) = key.host() {
            vec![host.to_string()]
        } else if let Some(group) = key.group() {
            self.policy
                .get_group(&GroupId::new(group))
                .map(|g| g.domains.clone())
                .unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn reconcile_day(&mut self, now: DateTime<Local>) {
        if DayKey::for_datetime(now) == self.state.day_counters.day {
            return;
        }

        // Flush the finishing day first; unflushed deltas stay keyed to it
        let _ = self.flush_usage(now);

        if let Some(day) = self.state.ensure_day(now) {
            self.usage.begin_day(day);
            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::RolloverCompleted { day }));
            info!(day = %day, "Day rollover completed");
            self.pending_events.push(CoreEvent::RolloverCompleted { day });
            self.persist(now);
        }
    }

    /// Write pending usage deltas through to the store. Failures retain the
    /// deltas and schedule a bounded retry.
    fn flush_usage(&mut self, now: DateTime<Local>) -> WardResult<()> {
        if !self.usage.has_pending() {
            return Ok(());
        }

        let items = self.usage.take_pending();
        let mut failed = Vec::new();
        let mut first_error: Option<StoreError> = None;

        for ((day, host), delta) in items {
            match self.store.add_usage(day, &host, &delta) {
                Ok(()) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    failed.push(((day, host), delta));
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => {
                warn!(error = %e, retained = failed.len(), "Usage flush failed, retaining deltas");
                self.usage.restore_pending(failed);
                self.note_save_failure(&e, now);
                Err(e.into())
            }
        }
    }

    /// Save the state document. A save requested while one is running is
    /// coalesced into a single trailing save.
    fn persist(&mut self, now: DateTime<Local>) {
        if self.save_in_flight {
            self.save_pending = true;
            return;
        }
        self.save_in_flight = true;

        let result = self.store.save_state(&self.state.to_persisted(now));
        self.save_in_flight = false;

        match result {
            Ok(()) => {
                self.save_failures = 0;
                if self.degraded {
                    self.degraded = false;
                    let _ = self
                        .store
                        .append_audit(AuditEvent::new(AuditEventType::StoreRecovered));
                    info!("Store recovered");
                    self.pending_events.push(CoreEvent::StoreRecovered);
                }
            }
            Err(e) => self.note_save_failure(&e, now),
        }

        if std::mem::take(&mut self.save_pending) {
            self.persist(now);
        }
    }

    fn note_save_failure(&mut self, e: &StoreError, now: DateTime<Local>) {
        self.save_failures += 1;
        warn!(
            error = %e,
            attempt = self.save_failures,
            "Save failed"
        );
        let _ = self.store.append_audit(AuditEvent::new(AuditEventType::SaveFailed {
            attempt: self.save_failures,
            error: e.to_string(),
        }));

        if self.save_failures > self.policy.service.save_retry_limit {
            if !self.degraded {
                self.degraded = true;
                error!(
                    failures = self.save_failures,
                    "Save retries exhausted, store degraded"
                );
                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::StoreDegraded {
                        failures: self.save_failures,
                    },
                ));
                self.pending_events.push(CoreEvent::StoreDegraded {
                    failures: self.save_failures,
                });
            }
        } else {
            // Bounded backoff via the alarm facility, not an in-process loop
            let backoff = Duration::from_secs(1 << self.save_failures.min(6));
            self.alarms.schedule(
                AlarmKind::SaveRetry,
                now + chrono::Duration::from_std(backoff).unwrap_or_default(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingAlarmClock;
    use chrono::TimeZone;
    use siteward_api::DenyReason;
    use siteward_store::{PersistedState, SessionRecord, SqliteStore};

    fn policy() -> Policy {
        siteward_config::default_policy().unwrap()
    }

    // Monday 2026-03-02
    fn monday(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn engine_with_store(store: Arc<dyn Store>, now: DateTime<Local>) -> WardEngine {
        WardEngine::bootstrap(policy(), store, Arc::new(RecordingAlarmClock::new()), now).unwrap()
    }

    fn engine(now: DateTime<Local>) -> WardEngine {
        engine_with_store(Arc::new(SqliteStore::in_memory().unwrap()), now)
    }

    #[test]
    fn unknown_hosts_are_always_allowed() {
        let mut engine = engine(monday(10, 0));
        let decision = engine.check_access("example.org", monday(10, 0));
        assert_eq!(decision, Decision::unconditional());
    }

    #[test]
    fn start_session_overwrites_idempotently() {
        let mut engine = engine(monday(10, 0));

        let first = engine
            .start_session("reddit.com", SessionKind::Grace, None, monday(10, 0))
            .unwrap();
        let second = engine
            .start_session("reddit.com", SessionKind::Grace, None, monday(10, 2))
            .unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(second.expires_at, monday(10, 7));
        assert!(engine.is_active(&second.key, monday(10, 6)));
        // Strictly less-than: dead exactly at expiry
        assert!(!engine.is_active(&second.key, monday(10, 7)));
    }

    #[test]
    fn start_session_on_unrestricted_host_fails() {
        let mut engine = engine(monday(10, 0));
        let result = engine.start_session("example.org", SessionKind::Grace, None, monday(10, 0));
        assert!(matches!(result, Err(WardError::UnrestrictedHost(_))));
    }

    #[test]
    fn grace_session_allows_blocked_host() {
        let mut engine = engine(monday(10, 0));

        assert!(matches!(
            engine.check_access("reddit.com", monday(10, 0)),
            Decision::Denied {
                reason: DenyReason::AlwaysBlocked { .. },
                ..
            }
        ));

        engine
            .start_session("reddit.com", SessionKind::Grace, None, monday(10, 0))
            .unwrap();

        match engine.check_access("reddit.com", monday(10, 1)) {
            Decision::Allowed { remaining, .. } => {
                assert_eq!(remaining, Some(Duration::from_secs(240)))
            }
            other => panic!("Expected session allow, got {:?}", other),
        }
    }

    #[test]
    fn expired_persisted_sessions_are_absent_after_bootstrap() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let now = monday(10, 0);

        let mut state = PersistedState::empty(now);
        let dead_key = SessionKey::for_host("reddit.com");
        let live_key = SessionKey::for_host("news.ycombinator.com");
        state.sessions.insert(
            dead_key.clone(),
            SessionRecord {
                kind: SessionKind::Grace,
                started_at: monday(9, 0),
                expires_at: monday(9, 5),
            },
        );
        state.sessions.insert(
            live_key.clone(),
            SessionRecord {
                kind: SessionKind::QuotaVisit,
                started_at: monday(9, 55),
                expires_at: monday(10, 5),
            },
        );
        store.save_state(&state).unwrap();

        let engine = engine_with_store(store, now);
        assert!(!engine.is_active(&dead_key, now));
        assert!(engine.is_active(&live_key, now));
    }

    #[test]
    fn usage_accumulates_and_is_queryable() {
        let mut engine = engine(monday(10, 0));

        engine.record_usage("reddit.com", 5, monday(10, 0)).unwrap();
        engine
            .record_usage("Reddit.com", 5, monday(10, 0) + chrono::Duration::seconds(20))
            .unwrap();
        engine
            .record_usage("reddit.com", 5, monday(10, 0) + chrono::Duration::seconds(40))
            .unwrap();

        let (_, usage) = engine.usage_for(None).unwrap();
        let record = &usage["reddit.com"];
        assert_eq!(record.time_ms, 15_000);
        assert_eq!(record.views, 1);
    }

    #[test]
    fn rollover_archives_day_and_resets_counters() {
        let mut engine = engine(monday(10, 0));
        let day_d = DayKey::for_datetime(monday(10, 0));

        // Anchor streaming's allowance and burn some usage on day D
        engine.check_access("youtube.com", monday(10, 0));
        engine.record_usage("youtube.com", 120, monday(10, 0)).unwrap();

        // Cross into day D+1
        let next_day = Local.with_ymd_and_hms(2026, 3, 3, 0, 0, 5).unwrap();
        engine.tick(next_day);

        // D's usage remains queryable from the archive
        let (_, archived) = engine.usage_for(Some(day_d)).unwrap();
        assert_eq!(archived["youtube.com"].time_ms, 120_000);

        // D+1 starts empty
        let (_, today) = engine.usage_for(None).unwrap();
        assert!(today.is_empty());

        // A fresh first access re-anchors the allowance on D+1
        let tuesday_morning = Local.with_ymd_and_hms(2026, 3, 3, 9, 30, 0).unwrap();
        match engine.check_access("youtube.com", tuesday_morning) {
            Decision::Allowed {
                allowance_remaining,
                ..
            } => assert_eq!(allowance_remaining, Some(Duration::from_secs(3600))),
            other => panic!("Expected fresh allowance, got {:?}", other),
        }

        let rollover_seen = engine
            .take_events()
            .iter()
            .any(|e| matches!(e, CoreEvent::RolloverCompleted { .. }));
        assert!(rollover_seen);
    }

    #[test]
    fn temp_access_counter_increments() {
        let mut engine = engine(monday(10, 0));

        assert_eq!(
            engine.record_temp_access("reddit.com", monday(10, 0)).unwrap(),
            1
        );
        assert_eq!(
            engine.record_temp_access("reddit.com", monday(10, 5)).unwrap(),
            2
        );

        let (_, usage) = engine.usage_for(None).unwrap();
        assert_eq!(usage["reddit.com"].temp_access_requests, 2);
    }

    #[test]
    fn site_info_is_read_only() {
        let mut engine = engine(monday(10, 0));

        let info = engine.site_info("news.ycombinator.com", monday(10, 0));
        assert_eq!(info.visits_remaining, Some(3));
        assert!(info.session_remaining.is_none());

        // Deriving the info must not have consumed a visit
        let info = engine.site_info("news.ycombinator.com", monday(10, 0));
        assert_eq!(info.visits_remaining, Some(3));

        // A real check does consume one
        engine.check_access("news.ycombinator.com", monday(10, 0));
        let info = engine.site_info("news.ycombinator.com", monday(10, 1));
        assert_eq!(info.visits_remaining, Some(2));
        assert!(info.session_remaining.is_some());
    }

    #[test]
    fn lazy_tick_expires_sessions_and_emits_event() {
        let mut engine = engine(monday(10, 0));

        engine
            .start_session("reddit.com", SessionKind::Grace, None, monday(10, 0))
            .unwrap();
        engine.take_events();

        engine.tick(monday(10, 6));

        let events = engine.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::SessionExpired { hosts, .. } if hosts == &vec!["reddit.com".to_string()]
        )));
    }

    #[test]
    fn state_survives_restart() {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());

        {
            let mut engine = engine_with_store(store.clone(), monday(10, 0));
            engine
                .start_session("reddit.com", SessionKind::Grace, None, monday(10, 0))
                .unwrap();
            // First streaming access anchors the allowance
            engine.check_access("youtube.com", monday(10, 0));
        }

        // Same day, new process: counters and live sessions persist
        let mut engine = engine_with_store(store, monday(10, 2));
        assert!(engine.is_active(&SessionKey::for_host("reddit.com"), monday(10, 2)));

        match engine.check_access("youtube.com", monday(10, 30)) {
            Decision::Allowed {
                allowance_remaining,
                ..
            } => assert_eq!(allowance_remaining, Some(Duration::from_secs(1800))),
            other => panic!("Expected continued allowance, got {:?}", other),
        }
    }
}
