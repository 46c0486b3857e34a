//! Configuration parsing and validation for sitewardd
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Policy groups with a closed set of rule types
//! - Time windows, allowances, quotas, and lunch sessions
//! - Validation with clear error messages
//!
//! An embedded default policy is available via [`default_policy`]; it goes
//! through the same parse/validate path as user configuration.

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// The embedded default policy table
const DEFAULT_POLICY_TOML: &str = include_str!("default.toml");

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Policy::from_raw(raw))
}

/// The embedded default policy, parsed and validated like any other config
pub fn default_policy() -> ConfigResult<Policy> {
    parse_config(DEFAULT_POLICY_TOML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1

            [[groups]]
            id = "social"
            domains = ["reddit.com"]
            rule = { type = "always_block" }
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.groups.len(), 1);
        assert_eq!(policy.groups[0].id.as_str(), "social");
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99

            [[groups]]
            id = "social"
            domains = ["reddit.com"]
            rule = { type = "always_block" }
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_groups() {
        let config = r#"
            config_version = 1

            [[groups]]
            id = "bad"
            domains = ["com"]
            rule = { type = "rate_limited", max_visits = 0, window_seconds = 0, visit_seconds = 0 }
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn default_policy_is_valid() {
        let policy = default_policy().unwrap();
        assert_eq!(policy.groups.len(), 3);

        let ids: Vec<_> = policy.groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["social", "streaming", "hacker-news"]);
    }
}
