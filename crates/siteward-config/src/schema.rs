//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Global service settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Policy groups, in priority order
    #[serde(default)]
    pub groups: Vec<RawGroup>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Log directory
    pub log_dir: Option<PathBuf>,

    /// Periodic autosave interval
    pub autosave_seconds: Option<u64>,

    /// Inactivity gap that separates view sessions
    pub view_timeout_seconds: Option<u64>,

    /// Hour of day before which first-access timestamps are not recorded
    pub day_start_hour: Option<u8>,

    /// How many times a failed save is retried before degrading
    pub save_retry_limit: Option<u32>,
}

/// Raw policy group definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawGroup {
    /// Unique stable ID
    pub id: String,

    /// Display label
    pub label: Option<String>,

    /// Domain suffixes this group matches (subdomains match too)
    pub domains: Vec<String>,

    /// Grace duration offered when access is denied
    pub grace_seconds: Option<u64>,

    /// The access rule
    pub rule: RawRule,
}

/// Raw access rule
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawRule {
    /// Blocked at all times; only grace sessions get through
    AlwaysBlock {},

    /// Daily allowance inside work hours, optional evening block and lunch
    WorkHours {
        /// Days of week: "weekdays", "weekends", "all", or a list like ["mon", "tue"]
        days: RawDays,
        /// Work window start (HH:MM)
        start: String,
        /// Work window end (HH:MM)
        end: String,
        /// Daily allowance inside the work window
        allowance_seconds: u64,
        #[serde(default)]
        evening: Option<RawEveningBlock>,
        #[serde(default)]
        lunch: Option<RawLunch>,
    },

    /// Bounded number of timed visits inside a rolling window
    RateLimited {
        max_visits: u32,
        window_seconds: u64,
        visit_seconds: u64,
    },
}

/// Evening block window (may cross midnight)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawEveningBlock {
    pub start: String,
    pub end: String,
    /// Evening-specific grace duration; group grace when omitted
    pub grace_seconds: Option<u64>,
}

/// Lunch session window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLunch {
    pub start: String,
    pub end: String,
    /// Duration of one lunch session
    pub session_seconds: u64,
    /// Lunch sessions available per day
    pub max_per_day: u32,
}

/// Days specification
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Preset(String),
    List(Vec<String>),
}
