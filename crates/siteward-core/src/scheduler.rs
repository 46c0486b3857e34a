//! Scheduled-callback abstraction
//!
//! Session expiry, midnight rollover, and save retries are driven by alarms
//! registered with the host's timer facility. Delivery is at-least-once and
//! approximately on time; the engine never depends on an alarm actually
//! firing. Every read path reconciles lazily (expired sessions are dead on
//! read, purged on load and on tick), so a missed alarm only delays the push
//! notification to clients.

use chrono::{DateTime, Local};
use siteward_util::SessionKey;
use std::sync::Mutex;

/// Identifies a scheduled callback. Scheduling the same kind again replaces
/// the previous registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    /// A session reaches its expiry
    SessionExpiry(SessionKey),
    /// Local midnight day rollover
    Rollover,
    /// Bounded retry of a failed save
    SaveRetry,
}

/// The host alarm facility
pub trait AlarmClock: Send + Sync {
    fn schedule(&self, alarm: AlarmKind, fire_at: DateTime<Local>);
    fn cancel(&self, alarm: &AlarmKind);
}

/// Clock that drops every registration.
///
/// With no eager callbacks, expiry is still enforced by the lazy checks;
/// only the push notifications are lost.
pub struct NullAlarmClock;

impl AlarmClock for NullAlarmClock {
    fn schedule(&self, _alarm: AlarmKind, _fire_at: DateTime<Local>) {}
    fn cancel(&self, _alarm: &AlarmKind) {}
}

/// Clock that records registrations, for tests
#[derive(Default)]
pub struct RecordingAlarmClock {
    scheduled: Mutex<Vec<(AlarmKind, DateTime<Local>)>>,
}

impl RecordingAlarmClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<(AlarmKind, DateTime<Local>)> {
        self.scheduled.lock().unwrap().clone()
    }

    /// Latest registration for a given kind
    pub fn fire_time(&self, alarm: &AlarmKind) -> Option<DateTime<Local>> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(kind, _)| kind == alarm)
            .map(|(_, at)| *at)
    }
}

impl AlarmClock for RecordingAlarmClock {
    fn schedule(&self, alarm: AlarmKind, fire_at: DateTime<Local>) {
        self.scheduled.lock().unwrap().push((alarm, fire_at));
    }

    fn cancel(&self, alarm: &AlarmKind) {
        self.scheduled.lock().unwrap().retain(|(kind, _)| kind != alarm);
    }
}
