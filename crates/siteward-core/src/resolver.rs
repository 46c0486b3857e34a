//! Host classification against the policy table

use siteward_config::Policy;
use siteward_util::GroupId;

/// Maps hostnames to policy groups by suffix matching.
///
/// The lookup table is flattened from the policy at construction, preserving
/// group order; the first matching domain wins.
#[derive(Debug)]
pub struct DomainResolver {
    table: Vec<(String, GroupId)>,
}

impl DomainResolver {
    pub fn from_policy(policy: &Policy) -> Self {
        let mut table = Vec::new();
        for group in &policy.groups {
            for domain in &group.domains {
                table.push((domain.clone(), group.id.clone()));
            }
        }
        Self { table }
    }

    /// Classify a host, returning the matching group.
    ///
    /// The full host is tried first; then the leftmost label is stripped and
    /// the remainder retried, stopping before a bare single-label suffix.
    /// Malformed hosts simply fail to match.
    pub fn classify(&self, host: &str) -> Option<&GroupId> {
        let host = normalize_host(host);
        if host.is_empty() {
            return None;
        }

        let mut candidate = host.as_str();
        loop {
            if let Some((_, group)) = self.table.iter().find(|(domain, _)| domain == candidate) {
                return Some(group);
            }

            match candidate.split_once('.') {
                Some((_, rest)) if rest.contains('.') => candidate = rest,
                _ => return None,
            }
        }
    }
}

/// Lowercase, trimmed, no trailing dot
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
