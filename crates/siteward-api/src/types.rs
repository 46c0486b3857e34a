//! Shared types for the sitewardd API

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use siteward_util::{GroupId, SessionKey};
use std::time::Duration;

/// Kind of temporary-access session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Short code-verified access on an otherwise-blocked site
    Grace,
    /// Time-boxed midday access, capped per day, shared across a group
    Lunch,
    /// One visit granted out of a rolling quota window
    QuotaVisit,
}

/// Access decision for a host at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum Decision {
    Allowed {
        /// Time left on an active session, if one is the reason for access
        remaining: Option<Duration>,
        /// Time left of a daily allowance, if one applies
        allowance_remaining: Option<Duration>,
    },
    Denied {
        reason: DenyReason,
        /// Grace duration the caller may request via start_session
        grace: Duration,
        /// Whether a lunch session can be started right now
        lunch_available: bool,
    },
}

impl Decision {
    pub fn unconditional() -> Self {
        Decision::Allowed {
            remaining: None,
            allowance_remaining: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Structured reasons for a denial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenyReason {
    /// Group is blocked at all times
    AlwaysBlocked { group: GroupId },
    /// Inside a configured evening block window
    EveningBlock { group: GroupId },
    /// Daily work-hours allowance used up
    AllowanceExhausted {
        group: GroupId,
        used: Duration,
        allowance: Duration,
    },
    /// Rolling visit quota full
    VisitQuotaExhausted {
        group: GroupId,
        max_visits: u32,
        /// When the oldest visit leaves the window and a slot frees
        retry_at: DateTime<Local>,
    },
}

/// A granted temporary-access session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub key: SessionKey,
    pub kind: SessionKind,
    pub expires_at: DateTime<Local>,
}

/// Per-day, per-host usage accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Cumulative active milliseconds
    pub time_ms: u64,
    /// Distinct view sessions (separated by an inactivity timeout)
    pub views: u32,
    /// First recorded access after the day-start hour
    pub first_access: Option<DateTime<Local>>,
    /// Most recent recorded access
    pub last_access: Option<DateTime<Local>>,
    /// Temporary-access requests made for this host today
    #[serde(default)]
    pub temp_access_requests: u32,
}

/// Read-only derived status for a host, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    pub host: String,
    /// None when the host matches no policy group
    pub group: Option<GroupId>,
    pub label: Option<String>,
    pub rule_summary: Option<String>,
    /// Time left on an active session covering this host
    pub session_remaining: Option<Duration>,
    /// Time left of the daily allowance, where one applies
    pub allowance_remaining: Option<Duration>,
    /// Visits left in the rolling quota window, where one applies
    pub visits_remaining: Option<u32>,
    /// Active milliseconds recorded for this host today
    pub usage_today_ms: u64,
}

/// Health status of the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub policy_loaded: bool,
    pub store_ok: bool,
    /// Set after bounded save retries have been exhausted
    pub store_degraded: bool,
}
