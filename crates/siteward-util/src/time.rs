//! Time utilities for sitewardd
//!
//! All policy semantics (work hours, evening blocks, lunch windows, day
//! rollover) are defined in local wall-clock time, so everything here works
//! on `DateTime<Local>`.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `SITEWARD_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising work-hour and evening-block policies without
//! waiting for the real clock.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2026-03-02 14:30:00`)

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "SITEWARD_MOCK_TIME";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                if let Ok(naive_dt) =
                    NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S")
                {
                    if let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() {
                        let real_now = chrono::Local::now();
                        let offset = mock_dt.signed_duration_since(real_now);
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                }
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = "%Y-%m-%d %H:%M:%S",
                    "Invalid mock time, using real clock"
                );
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Get the current local time, respecting mock time settings in debug builds.
///
/// In release builds, this always returns the real system time.
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Duration from `earlier` to `now`, zero if `earlier` is in the future
pub fn elapsed_since(earlier: DateTime<Local>, now: DateTime<Local>) -> Duration {
    now.signed_duration_since(earlier)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Duration from `now` until `later`, zero if `later` has passed
pub fn remaining_until(later: DateTime<Local>, now: DateTime<Local>) -> Duration {
    later.signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// The next local midnight strictly after `now`
pub fn next_local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let next_day = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    let midnight = next_day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or(now)
}

/// A local calendar date used to scope daily counters and usage records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn for_datetime(dt: DateTime<Local>) -> Self {
        Self(dt.date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Self)
    }
}

/// Wall-clock time of day for policy windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn from_datetime(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    /// Returns seconds since midnight
    pub fn as_seconds_from_midnight(&self) -> u32 {
        (self.hour as u32) * 3600 + (self.minute as u32) * 60
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_seconds_from_midnight()
            .cmp(&other.as_seconds_from_midnight())
    }
}

/// Days of the week mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const MONDAY: u8 = 1 << 0;
    pub const TUESDAY: u8 = 1 << 1;
    pub const WEDNESDAY: u8 = 1 << 2;
    pub const THURSDAY: u8 = 1 << 3;
    pub const FRIDAY: u8 = 1 << 4;
    pub const SATURDAY: u8 = 1 << 5;
    pub const SUNDAY: u8 = 1 << 6;

    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(
        Self::MONDAY | Self::TUESDAY | Self::WEDNESDAY | Self::THURSDAY | Self::FRIDAY,
    );
    pub const WEEKENDS: DaysOfWeek = DaysOfWeek(Self::SATURDAY | Self::SUNDAY);
    pub const ALL_DAYS: DaysOfWeek = DaysOfWeek(0x7F);

    pub fn new(mask: u8) -> Self {
        Self(mask & 0x7F)
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        let bit = match weekday {
            Weekday::Mon => Self::MONDAY,
            Weekday::Tue => Self::TUESDAY,
            Weekday::Wed => Self::WEDNESDAY,
            Weekday::Thu => Self::THURSDAY,
            Weekday::Fri => Self::FRIDAY,
            Weekday::Sat => Self::SATURDAY,
            Weekday::Sun => Self::SUNDAY,
        };
        (self.0 & bit) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DaysOfWeek {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// A recurring time-of-day window, possibly crossing midnight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub days: DaysOfWeek,
    pub start: WallClock,
    pub end: WallClock,
}

impl TimeWindow {
    pub fn new(days: DaysOfWeek, start: WallClock, end: WallClock) -> Self {
        Self { days, start, end }
    }

    /// Check if the given local datetime falls within this window.
    ///
    /// For windows that cross midnight (e.g. 21:00-06:00) the day mask is
    /// tested against the day the window *started* on, so a Friday-only
    /// evening block still covers the small hours of Saturday.
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        let time = WallClock::from_datetime(dt);

        if self.start <= self.end {
            self.days.contains(dt.weekday()) && time >= self.start && time < self.end
        } else if time >= self.start {
            // Evening portion of a cross-midnight window
            self.days.contains(dt.weekday())
        } else if time < self.end {
            // Morning portion; attribute to the previous day
            self.days.contains(dt.weekday().pred())
        } else {
            false
        }
    }

    /// Duration remaining in this window from the given time
    pub fn remaining_duration(&self, dt: &DateTime<Local>) -> Option<Duration> {
        if !self.contains(dt) {
            return None;
        }

        let now_secs = WallClock::from_datetime(dt).as_seconds_from_midnight();
        let end_secs = self.end.as_seconds_from_midnight();

        let remaining_secs = if self.start <= self.end {
            end_secs.saturating_sub(now_secs)
        } else if now_secs >= self.start.as_seconds_from_midnight() {
            (86400 - now_secs) + end_secs
        } else {
            end_secs.saturating_sub(now_secs)
        };

        Some(Duration::from_secs(remaining_secs as u64))
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wall_clock_ordering() {
        let morning = WallClock::new(8, 0).unwrap();
        let noon = WallClock::new(12, 0).unwrap();
        let evening = WallClock::new(21, 30).unwrap();

        assert!(morning < noon);
        assert!(noon < evening);
    }

    #[test]
    fn days_of_week_presets() {
        let weekdays = DaysOfWeek::WEEKDAYS;
        assert!(weekdays.contains(Weekday::Mon));
        assert!(weekdays.contains(Weekday::Fri));
        assert!(!weekdays.contains(Weekday::Sat));

        let weekends = DaysOfWeek::WEEKENDS;
        assert!(weekends.contains(Weekday::Sun));
        assert!(!weekends.contains(Weekday::Wed));
    }

    #[test]
    fn window_contains_same_day() {
        let window = TimeWindow::new(
            DaysOfWeek::WEEKDAYS,
            WallClock::new(9, 0).unwrap(),
            WallClock::new(17, 30).unwrap(),
        );

        // Monday 10 AM - inside
        let dt = Local.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        assert!(window.contains(&dt));

        // Monday 8 AM - before window
        let dt = Local.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        assert!(!window.contains(&dt));

        // Saturday 10 AM - wrong day
        let dt = Local.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        assert!(!window.contains(&dt));

        // End boundary is exclusive
        let dt = Local.with_ymd_and_hms(2026, 3, 2, 17, 30, 0).unwrap();
        assert!(!window.contains(&dt));
    }

    #[test]
    fn window_crossing_midnight() {
        let window = TimeWindow::new(
            DaysOfWeek::ALL_DAYS,
            WallClock::new(21, 0).unwrap(),
            WallClock::new(6, 0).unwrap(),
        );

        // 11 PM - evening portion
        let dt = Local.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap();
        assert!(window.contains(&dt));

        // 2 AM - morning portion
        let dt = Local.with_ymd_and_hms(2026, 3, 3, 2, 0, 0).unwrap();
        assert!(window.contains(&dt));

        // Noon - outside
        let dt = Local.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap();
        assert!(!window.contains(&dt));
    }

    #[test]
    fn window_remaining_duration() {
        let window = TimeWindow::new(
            DaysOfWeek::ALL_DAYS,
            WallClock::new(12, 0).unwrap(),
            WallClock::new(13, 30).unwrap(),
        );

        let dt = Local.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap();
        assert_eq!(
            window.remaining_duration(&dt),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn day_key_roundtrip() {
        let dt = Local.with_ymd_and_hms(2026, 3, 2, 23, 59, 59).unwrap();
        let day = DayKey::for_datetime(dt);
        assert_eq!(day.to_string(), "2026-03-02");

        let parsed: DayKey = "2026-03-02".parse().unwrap();
        assert_eq!(parsed, day);
        assert_eq!(day.next().to_string(), "2026-03-03");
    }

    #[test]
    fn midnight_is_start_of_next_day() {
        let dt = Local.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap();
        let midnight = next_local_midnight(dt);
        assert_eq!(DayKey::for_datetime(midnight).to_string(), "2026-03-03");
        assert_eq!(midnight.hour(), 0);
        assert_eq!(midnight.minute(), 0);
    }

    #[test]
    fn elapsed_and_remaining_saturate() {
        let t1 = Local.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let t2 = Local.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap();

        assert_eq!(elapsed_since(t1, t2), Duration::from_secs(1800));
        assert_eq!(elapsed_since(t2, t1), Duration::ZERO);
        assert_eq!(remaining_until(t2, t1), Duration::from_secs(1800));
        assert_eq!(remaining_until(t1, t2), Duration::ZERO);
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }
}
