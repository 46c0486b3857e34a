//! Session and quota management

use chrono::{DateTime, Local};
use siteward_api::SessionKind;
use siteward_store::SessionRecord;
use siteward_util::{GroupId, SessionKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{AlarmClock, AlarmKind, EngineState};

/// Creates, expires, and queries temporary-access grants.
///
/// Expiry is enforced two ways: lazily, because every read goes through
/// `EngineState::live_session`, and eagerly through the alarm scheduled
/// here. The lazy path is the source of truth; the alarm only exists so
/// clients get a push when access is revoked mid-browse.
pub struct SessionManager {
    alarms: Arc<dyn AlarmClock>,
}

impl SessionManager {
    pub fn new(alarms: Arc<dyn AlarmClock>) -> Self {
        Self { alarms }
    }

    /// Unconditionally create or overwrite the session under `key`.
    ///
    /// Calling twice with the same key replaces the grant with the new
    /// expiry; a retried lunch start does not consume a second slot while
    /// the first grant is still live.
    pub fn start(
        &self,
        state: &mut EngineState,
        key: SessionKey,
        kind: SessionKind,
        duration: Duration,
        now: DateTime<Local>,
    ) -> SessionRecord {
        let expires_at = now + chrono::Duration::from_std(duration).unwrap_or_default();

        let replacing_live = state.live_session(&key, now).is_some();
        if kind == SessionKind::Lunch && !replacing_live {
            if let Some(group) = key.group() {
                *state
                    .day_counters
                    .lunch_used
                    .entry(GroupId::new(group))
                    .or_insert(0) += 1;
            }
        }

        let record = SessionRecord {
            kind,
            started_at: now,
            expires_at,
        };
        state.sessions.insert(key.clone(), record.clone());

        self.alarms
            .schedule(AlarmKind::SessionExpiry(key.clone()), expires_at);

        info!(
            key = %key,
            kind = ?kind,
            expires_at = %expires_at,
            replaced = replacing_live,
            "Session started"
        );

        record
    }

    /// Is there a live session under `key`?
    pub fn is_active(&self, state: &EngineState, key: &SessionKey, now: DateTime<Local>) -> bool {
        state.live_session(key, now).is_some()
    }

    /// Remove the session under `key` if its expiry has passed.
    ///
    /// Used by the eager alarm path; a stale alarm for a grant that has
    /// since been overwritten with a later expiry is a no-op.
    pub fn expire_if_due(
        &self,
        state: &mut EngineState,
        key: &SessionKey,
        now: DateTime<Local>,
    ) -> Option<SessionRecord> {
        match state.sessions.get(key) {
            Some(session) if !session.is_live(now) => {
                let session = state.sessions.remove(key);
                debug!(key = %key, "Session expired");
                session
            }
            _ => None,
        }
    }

    /// Lazy reconciliation: purge everything dead, cancelling stale alarms
    pub fn sweep(
        &self,
        state: &mut EngineState,
        now: DateTime<Local>,
    ) -> Vec<(SessionKey, SessionRecord)> {
        let purged = state.sweep_expired(now);
        for (key, _) in &purged {
            self.alarms.cancel(&AlarmKind::SessionExpiry(key.clone()));
        }
        purged
    }
}
