//! Validated policy structures

use crate::schema::{RawConfig, RawEveningBlock, RawGroup, RawLunch, RawRule, RawServiceConfig};
use crate::validation::{parse_days, parse_time};
use siteward_util::{DaysOfWeek, GroupId, TimeWindow, WallClock};
use std::path::PathBuf;
use std::time::Duration;

/// Validated policy ready for use by the core engine
#[derive(Debug, Clone)]
pub struct Policy {
    /// Service configuration
    pub service: ServiceConfig,

    /// Policy groups, in priority order
    pub groups: Vec<PolicyGroup>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let groups = raw.groups.into_iter().map(PolicyGroup::from_raw).collect();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            groups,
        }
    }

    /// Get group by ID
    pub fn get_group(&self, id: &GroupId) -> Option<&PolicyGroup> {
        self.groups.iter().find(|g| &g.id == id)
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub autosave: Duration,
    pub view_timeout: Duration,
    pub day_start_hour: u8,
    pub save_retry_limit: u32,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(siteward_util::socket_path_without_env),
            data_dir: raw
                .data_dir
                .unwrap_or_else(siteward_util::data_dir_without_env),
            log_dir: raw.log_dir.unwrap_or_else(siteward_util::default_log_dir),
            autosave: Duration::from_secs(raw.autosave_seconds.unwrap_or(60)),
            view_timeout: Duration::from_secs(raw.view_timeout_seconds.unwrap_or(60)),
            day_start_hour: raw.day_start_hour.unwrap_or(5).min(23),
            save_retry_limit: raw.save_retry_limit.unwrap_or(3),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Validated policy group
#[derive(Debug, Clone)]
pub struct PolicyGroup {
    pub id: GroupId,
    pub label: String,
    /// Domain suffixes, matched with subdomain stripping
    pub domains: Vec<String>,
    /// Grace duration offered on denial
    pub grace: Duration,
    pub rule: Rule,
}

impl PolicyGroup {
    fn from_raw(raw: RawGroup) -> Self {
        let label = raw.label.unwrap_or_else(|| raw.id.clone());
        let grace = Duration::from_secs(raw.grace_seconds.unwrap_or(300));
        let domains = raw
            .domains
            .into_iter()
            .map(|d| d.trim().trim_start_matches("www.").to_ascii_lowercase())
            .collect();

        Self {
            id: GroupId::new(raw.id),
            label,
            domains,
            grace,
            rule: Rule::from_raw(raw.rule, grace),
        }
    }
}

/// Closed set of access rules, dispatched by pattern match
#[derive(Debug, Clone)]
pub enum Rule {
    AlwaysBlock,
    WorkHoursAllowance(WorkHoursRule),
    RateLimitedVisits(RateLimitRule),
}

impl Rule {
    fn from_raw(raw: RawRule, group_grace: Duration) -> Self {
        match raw {
            RawRule::AlwaysBlock {} => Rule::AlwaysBlock,
            RawRule::WorkHours {
                days,
                start,
                end,
                allowance_seconds,
                evening,
                lunch,
            } => Rule::WorkHoursAllowance(WorkHoursRule {
                window: convert_window(&days, &start, &end),
                allowance: Duration::from_secs(allowance_seconds),
                evening: evening.map(|e| EveningBlock::from_raw(e, group_grace)),
                lunch: lunch.map(LunchPolicy::from_raw),
            }),
            RawRule::RateLimited {
                max_visits,
                window_seconds,
                visit_seconds,
            } => Rule::RateLimitedVisits(RateLimitRule {
                max_visits,
                window: Duration::from_secs(window_seconds),
                visit: Duration::from_secs(visit_seconds),
            }),
        }
    }

    /// One-line summary for status displays
    pub fn summary(&self) -> String {
        match self {
            Rule::AlwaysBlock => "blocked at all times".into(),
            Rule::WorkHoursAllowance(wh) => format!(
                "{} daily allowance during work hours",
                siteward_util::format_duration(wh.allowance)
            ),
            Rule::RateLimitedVisits(rl) => format!(
                "{} visits of {} per {}",
                rl.max_visits,
                siteward_util::format_duration(rl.visit),
                siteward_util::format_duration(rl.window)
            ),
        }
    }
}

/// Work-hours allowance parameters
#[derive(Debug, Clone)]
pub struct WorkHoursRule {
    /// The restricted work window
    pub window: TimeWindow,
    /// Daily allowance inside the window
    pub allowance: Duration,
    pub evening: Option<EveningBlock>,
    pub lunch: Option<LunchPolicy>,
}

/// Evening block parameters
#[derive(Debug, Clone)]
pub struct EveningBlock {
    pub window: TimeWindow,
    pub grace: Duration,
}

impl EveningBlock {
    fn from_raw(raw: RawEveningBlock, group_grace: Duration) -> Self {
        let (start_h, start_m) = parse_time(&raw.start).unwrap_or((21, 0));
        let (end_h, end_m) = parse_time(&raw.end).unwrap_or((6, 0));

        Self {
            window: TimeWindow::new(
                DaysOfWeek::ALL_DAYS,
                WallClock::new(start_h, start_m).unwrap_or(WallClock { hour: 21, minute: 0 }),
                WallClock::new(end_h, end_m).unwrap_or(WallClock { hour: 6, minute: 0 }),
            ),
            grace: raw.grace_seconds.map(Duration::from_secs).unwrap_or(group_grace),
        }
    }
}

/// Lunch session parameters
#[derive(Debug, Clone)]
pub struct LunchPolicy {
    pub window: TimeWindow,
    /// Duration of one lunch session
    pub session: Duration,
    /// Lunch sessions available per day
    pub max_per_day: u32,
}

impl LunchPolicy {
    fn from_raw(raw: RawLunch) -> Self {
        let (start_h, start_m) = parse_time(&raw.start).unwrap_or((12, 0));
        let (end_h, end_m) = parse_time(&raw.end).unwrap_or((13, 30));

        Self {
            window: TimeWindow::new(
                DaysOfWeek::ALL_DAYS,
                WallClock::new(start_h, start_m).unwrap_or(WallClock { hour: 12, minute: 0 }),
                WallClock::new(end_h, end_m).unwrap_or(WallClock { hour: 13, minute: 30 }),
            ),
            session: Duration::from_secs(raw.session_seconds),
            max_per_day: raw.max_per_day,
        }
    }
}

/// Rolling visit quota parameters
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub max_visits: u32,
    /// Span of the rolling window
    pub window: Duration,
    /// Duration of one granted visit
    pub visit: Duration,
}

fn convert_window(days: &crate::schema::RawDays, start: &str, end: &str) -> TimeWindow {
    let days_mask = parse_days(days).unwrap_or(0x7F);
    let (start_h, start_m) = parse_time(start).unwrap_or((0, 0));
    let (end_h, end_m) = parse_time(end).unwrap_or((23, 59));

    TimeWindow::new(
        DaysOfWeek::new(days_mask),
        WallClock::new(start_h, start_m).unwrap_or(WallClock { hour: 0, minute: 0 }),
        WallClock::new(end_h, end_m).unwrap_or(WallClock { hour: 23, minute: 59 }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_domains_are_normalized() {
        let raw = RawGroup {
            id: "social".into(),
            label: None,
            domains: vec!["WWW.Reddit.Com".into(), " twitter.com ".into()],
            grace_seconds: Some(300),
            rule: RawRule::AlwaysBlock {},
        };

        let group = PolicyGroup::from_raw(raw);
        assert_eq!(group.domains, vec!["reddit.com", "twitter.com"]);
        assert_eq!(group.label, "social");
    }

    #[test]
    fn evening_grace_falls_back_to_group_grace() {
        let rule = Rule::from_raw(
            RawRule::WorkHours {
                days: crate::schema::RawDays::Preset("weekdays".into()),
                start: "09:00".into(),
                end: "17:30".into(),
                allowance_seconds: 3600,
                evening: Some(RawEveningBlock {
                    start: "21:00".into(),
                    end: "06:00".into(),
                    grace_seconds: None,
                }),
                lunch: None,
            },
            Duration::from_secs(240),
        );

        match rule {
            Rule::WorkHoursAllowance(wh) => {
                assert_eq!(wh.evening.unwrap().grace, Duration::from_secs(240));
            }
            other => panic!("Expected work-hours rule, got {:?}", other),
        }
    }

    #[test]
    fn rule_summaries_are_readable() {
        let rule = Rule::RateLimitedVisits(RateLimitRule {
            max_visits: 3,
            window: Duration::from_secs(3 * 3600),
            visit: Duration::from_secs(600),
        });

        assert_eq!(rule.summary(), "3 visits of 10m 0s per 3h 0m 0s");
    }
}
