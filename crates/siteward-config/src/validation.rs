//! Configuration validation

use crate::schema::{RawConfig, RawDays, RawGroup, RawRule};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Group '{group_id}': {message}")]
    GroupError { group_id: String, message: String },

    #[error("Duplicate group ID: {0}")]
    DuplicateGroupId(String),

    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid day specification: {0}")]
    InvalidDaySpec(String),

    #[error("Group '{group_id}': domain '{domain}' {message}")]
    InvalidDomain {
        group_id: String,
        domain: String,
        message: String,
    },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Check for duplicate group IDs
    let mut seen_ids = HashSet::new();
    for group in &config.groups {
        if !seen_ids.insert(&group.id) {
            errors.push(ValidationError::DuplicateGroupId(group.id.clone()));
        }
    }

    for group in &config.groups {
        errors.extend(validate_group(group));
    }

    errors
}

fn validate_group(group: &RawGroup) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if group.domains.is_empty() {
        errors.push(ValidationError::GroupError {
            group_id: group.id.clone(),
            message: "at least one domain is required".into(),
        });
    }

    for domain in &group.domains {
        // A bare TLD would swallow the whole namespace via suffix matching
        if !domain.contains('.') {
            errors.push(ValidationError::InvalidDomain {
                group_id: group.id.clone(),
                domain: domain.clone(),
                message: "must have at least two labels".into(),
            });
        } else if domain.starts_with('.')
            || domain.ends_with('.')
            || domain.split('.').any(|label| label.is_empty())
        {
            errors.push(ValidationError::InvalidDomain {
                group_id: group.id.clone(),
                domain: domain.clone(),
                message: "has an empty label".into(),
            });
        }
    }

    match &group.rule {
        RawRule::AlwaysBlock {} => {}

        RawRule::WorkHours {
            days,
            start,
            end,
            allowance_seconds,
            evening,
            lunch,
        } => {
            if let Err(e) = parse_days(days) {
                errors.push(ValidationError::InvalidDaySpec(e));
            }
            errors.extend(check_time(start, &group.id));
            errors.extend(check_time(end, &group.id));

            if *allowance_seconds == 0 {
                errors.push(ValidationError::GroupError {
                    group_id: group.id.clone(),
                    message: "allowance_seconds must be positive".into(),
                });
            }

            if let Some(evening) = evening {
                errors.extend(check_time(&evening.start, &group.id));
                errors.extend(check_time(&evening.end, &group.id));
            }

            if let Some(lunch) = lunch {
                errors.extend(check_time(&lunch.start, &group.id));
                errors.extend(check_time(&lunch.end, &group.id));

                if lunch.session_seconds == 0 {
                    errors.push(ValidationError::GroupError {
                        group_id: group.id.clone(),
                        message: "lunch session_seconds must be positive".into(),
                    });
                }
                if lunch.max_per_day == 0 {
                    errors.push(ValidationError::GroupError {
                        group_id: group.id.clone(),
                        message: "lunch max_per_day must be at least 1".into(),
                    });
                }
                if let (Ok(start), Ok(end)) = (parse_time(&lunch.start), parse_time(&lunch.end)) {
                    if start >= end {
                        errors.push(ValidationError::GroupError {
                            group_id: group.id.clone(),
                            message: "lunch window must not be empty or cross midnight".into(),
                        });
                    }
                }
            }
        }

        RawRule::RateLimited {
            max_visits,
            window_seconds,
            visit_seconds,
        } => {
            if *max_visits == 0 {
                errors.push(ValidationError::GroupError {
                    group_id: group.id.clone(),
                    message: "max_visits must be at least 1".into(),
                });
            }
            if *window_seconds == 0 {
                errors.push(ValidationError::GroupError {
                    group_id: group.id.clone(),
                    message: "window_seconds must be positive".into(),
                });
            }
            if *visit_seconds == 0 {
                errors.push(ValidationError::GroupError {
                    group_id: group.id.clone(),
                    message: "visit_seconds must be positive".into(),
                });
            }
        }
    }

    errors
}

fn check_time(value: &str, _group_id: &str) -> Vec<ValidationError> {
    match parse_time(value) {
        Ok(_) => vec![],
        Err(e) => vec![ValidationError::InvalidTimeFormat {
            value: value.to_string(),
            message: e,
        }],
    }
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected HH:MM format".into());
    }

    let hour: u8 = parts[0].parse().map_err(|_| "Invalid hour".to_string())?;
    let minute: u8 = parts[1].parse().map_err(|_| "Invalid minute".to_string())?;

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }

    Ok((hour, minute))
}

/// Parse days specification into a weekday mask
pub fn parse_days(days: &RawDays) -> Result<u8, String> {
    match days {
        RawDays::Preset(preset) => match preset.to_lowercase().as_str() {
            "all" | "every" | "daily" => Ok(0x7F),
            "weekdays" => Ok(0x1F), // Mon-Fri
            "weekends" => Ok(0x60), // Sat-Sun
            other => Err(format!("Unknown day preset: {}", other)),
        },
        RawDays::List(list) => {
            let mut mask = 0u8;
            for day in list {
                let bit = match day.to_lowercase().as_str() {
                    "mon" | "monday" => 1 << 0,
                    "tue" | "tuesday" => 1 << 1,
                    "wed" | "wednesday" => 1 << 2,
                    "thu" | "thursday" => 1 << 3,
                    "fri" | "friday" => 1 << 4,
                    "sat" | "saturday" => 1 << 5,
                    "sun" | "sunday" => 1 << 6,
                    other => return Err(format!("Unknown day: {}", other)),
                };
                mask |= bit;
            }
            Ok(mask)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with_domains(domains: Vec<&str>) -> RawGroup {
        RawGroup {
            id: "test".into(),
            label: None,
            domains: domains.into_iter().map(String::from).collect(),
            grace_seconds: None,
            rule: RawRule::AlwaysBlock {},
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:00").unwrap(), (9, 0));
        assert_eq!(parse_time("23:59").unwrap(), (23, 59));

        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days(&RawDays::Preset("weekdays".into())).unwrap(), 0x1F);
        assert_eq!(parse_days(&RawDays::Preset("weekends".into())).unwrap(), 0x60);
        assert_eq!(
            parse_days(&RawDays::List(vec!["mon".into(), "fri".into()])).unwrap(),
            0b10001
        );
        assert!(parse_days(&RawDays::Preset("someday".into())).is_err());
    }

    #[test]
    fn rejects_single_label_domain() {
        let config = RawConfig {
            config_version: 1,
            service: Default::default(),
            groups: vec![group_with_domains(vec!["com"])],
        };

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidDomain { .. })));
    }

    #[test]
    fn rejects_duplicate_group_ids() {
        let config = RawConfig {
            config_version: 1,
            service: Default::default(),
            groups: vec![
                group_with_domains(vec!["reddit.com"]),
                group_with_domains(vec!["twitter.com"]),
            ],
        };

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateGroupId(_))));
    }

    #[test]
    fn rejects_empty_lunch_window() {
        let config = RawConfig {
            config_version: 1,
            service: Default::default(),
            groups: vec![RawGroup {
                id: "streaming".into(),
                label: None,
                domains: vec!["youtube.com".into()],
                grace_seconds: None,
                rule: RawRule::WorkHours {
                    days: RawDays::Preset("weekdays".into()),
                    start: "09:00".into(),
                    end: "17:30".into(),
                    allowance_seconds: 3600,
                    evening: None,
                    lunch: Some(crate::schema::RawLunch {
                        start: "13:30".into(),
                        end: "12:00".into(),
                        session_seconds: 1800,
                        max_per_day: 1,
                    }),
                },
            }],
        };

        let errors = validate_config(&config);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::GroupError { .. })));
    }
}
