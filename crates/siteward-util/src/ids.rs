//! Strongly-typed identifiers for sitewardd

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a policy group in the site table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Key under which a temporary-access session is stored.
///
/// Grace and quota-visit sessions are scoped to a single host; lunch
/// sessions are shared across a whole policy group. The prefix keeps the
/// two namespaces from colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn for_host(host: &str) -> Self {
        Self(format!("host:{}", host.trim().to_ascii_lowercase()))
    }

    pub fn for_group(group: &GroupId) -> Self {
        Self(format!("group:{}", group.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host this key is scoped to, if host-scoped
    pub fn host(&self) -> Option<&str> {
        self.0.strip_prefix("host:")
    }

    /// The group this key is scoped to, if group-scoped
    pub fn group(&self) -> Option<&str> {
        self.0.strip_prefix("group:")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
