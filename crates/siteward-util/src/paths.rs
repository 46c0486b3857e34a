//! Default paths for sitewardd components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/sitewardd/sitewardd.sock` or `/tmp/sitewardd-$USER/sitewardd.sock`
//! - Data: `$XDG_DATA_HOME/sitewardd` or `~/.local/share/sitewardd`
//! - Logs: `$XDG_STATE_HOME/sitewardd` or `~/.local/state/sitewardd`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const SITEWARD_SOCKET_ENV: &str = "SITEWARD_SOCKET";

/// Environment variable for overriding the data directory
pub const SITEWARD_DATA_DIR_ENV: &str = "SITEWARD_DATA_DIR";

const SOCKET_FILENAME: &str = "sitewardd.sock";
const APP_DIR: &str = "sitewardd";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$SITEWARD_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/sitewardd/sitewardd.sock`
/// 3. `/tmp/sitewardd-$USER/sitewardd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(SITEWARD_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking the SITEWARD_SOCKET env var
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$SITEWARD_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/sitewardd`
/// 3. `~/.local/share/sitewardd` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(SITEWARD_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the SITEWARD_DATA_DIR env var
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default log directory
pub fn default_log_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("logs")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}
