//! Rolling-window counters
//!
//! A `RollingWindow` holds the timestamps of discrete events inside a
//! sliding time span. The quota policy ("3 visits per 3 hours") persists one
//! per policy group; the IPC layer uses the same structure for per-client
//! request limiting.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::ClientId;

/// Ordered timestamps of events inside a sliding window.
///
/// The span is policy configuration and is passed into each call rather than
/// stored, so the serialized form is just the timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollingWindow {
    events: VecDeque<DateTime<Local>>,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<DateTime<Local>>) -> Self {
        let mut events: VecDeque<_> = events.into();
        events.make_contiguous().sort();
        Self { events }
    }

    /// Drop every event whose slot has freed. An event at time `t` occupies
    /// its slot while `t + span > now`; at exactly `t + span` it is gone.
    pub fn prune(&mut self, now: DateTime<Local>, span: Duration) {
        while let Some(oldest) = self.events.front() {
            let freed = *oldest + chrono::Duration::from_std(span).unwrap_or_default();
            if freed <= now {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn oldest(&self) -> Option<DateTime<Local>> {
        self.events.front().copied()
    }

    pub fn record(&mut self, now: DateTime<Local>) {
        self.events.push_back(now);
    }

    /// Prune, then admit the event if the window still has room.
    /// Returns whether the event was admitted.
    pub fn try_admit(&mut self, now: DateTime<Local>, span: Duration, max: u32) -> bool {
        self.prune(now, span);
        if (self.events.len() as u32) < max {
            self.events.push_back(now);
            true
        } else {
            false
        }
    }

    /// Count without mutating: events still occupying a slot at `now`
    pub fn live_count(&self, now: DateTime<Local>, span: Duration) -> usize {
        let span = chrono::Duration::from_std(span).unwrap_or_default();
        self.events.iter().filter(|ts| **ts + span > now).count()
    }
}

/// Per-client request limiter built on rolling windows
#[derive(Debug)]
pub struct ClientLimiter {
    max: u32,
    span: Duration,
    windows: HashMap<ClientId, RollingWindow>,
}

impl ClientLimiter {
    pub fn new(max_requests: u32, span: Duration) -> Self {
        Self {
            max: max_requests,
            span,
            windows: HashMap::new(),
        }
    }

    /// Returns `true` if the request is allowed, `false` if limited
    pub fn check(&mut self, client_id: &ClientId, now: DateTime<Local>) -> bool {
        self.windows
            .entry(client_id.clone())
            .or_default()
            .try_admit(now, self.span, self.max)
    }

    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.windows.remove(client_id);
    }
}
