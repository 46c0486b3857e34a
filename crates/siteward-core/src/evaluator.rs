//! The access-decision state machine

use chrono::{DateTime, Local};
use siteward_api::{Decision, DenyReason, SessionKind};
use siteward_config::{PolicyGroup, Rule, WorkHoursRule};
use siteward_store::SessionRecord;
use siteward_util::{SessionKey, elapsed_since, remaining_until};

use crate::{EngineState, SessionManager};

/// Result of evaluating a classified host
#[derive(Debug)]
pub struct EvalOutcome {
    pub decision: Decision,
    /// Whether durable state was mutated and needs a save
    pub dirty: bool,
    /// A session auto-granted during evaluation (rate-limited visits)
    pub granted: Option<(SessionKey, SessionRecord)>,
}

impl EvalOutcome {
    fn decision(decision: Decision) -> Self {
        Self {
            decision,
            dirty: false,
            granted: None,
        }
    }
}

/// Evaluate access for `host`, already classified into `group`.
///
/// Checked in order: a live session always wins, then the group's rule.
/// Boundary comparisons are strict: a request landing exactly at an expiry
/// or exactly at the end of an allowance is denied.
pub fn evaluate(
    group: &PolicyGroup,
    host: &str,
    sessions: &SessionManager,
    state: &mut EngineState,
    now: DateTime<Local>,
) -> EvalOutcome {
    // An active grant supersedes all policy logic
    for key in [SessionKey::for_host(host), SessionKey::for_group(&group.id)] {
        if let Some(session) = state.live_session(&key, now) {
            return EvalOutcome::decision(Decision::Allowed {
                remaining: Some(remaining_until(session.expires_at, now)),
                allowance_remaining: None,
            });
        }
    }

    match &group.rule {
        Rule::AlwaysBlock => EvalOutcome::decision(Decision::Denied {
            reason: DenyReason::AlwaysBlocked {
                group: group.id.clone(),
            },
            grace: group.grace,
            lunch_available: false,
        }),

        Rule::WorkHoursAllowance(rule) => evaluate_work_hours(group, rule, state, now),

        Rule::RateLimitedVisits(rule) => {
            let (has_room, retry_at) = {
                let window = state.quota_windows.entry(group.id.clone()).or_default();
                window.prune(now, rule.window);
                let has_room = (window.count() as u32) < rule.max_visits;
                let retry_at = window
                    .oldest()
                    .map(|oldest| oldest + chrono::Duration::from_std(rule.window).unwrap_or_default());
                (has_room, retry_at)
            };

            if has_room {
                // This rule auto-grants on evaluation: record the visit and
                // start a timed session for the host
                if let Some(window) = state.quota_windows.get_mut(&group.id) {
                    window.record(now);
                }
                let key = SessionKey::for_host(host);
                let record =
                    sessions.start(state, key.clone(), SessionKind::QuotaVisit, rule.visit, now);

                EvalOutcome {
                    decision: Decision::Allowed {
                        remaining: Some(rule.visit),
                        allowance_remaining: None,
                    },
                    dirty: true,
                    granted: Some((key, record)),
                }
            } else {
                EvalOutcome::decision(Decision::Denied {
                    reason: DenyReason::VisitQuotaExhausted {
                        group: group.id.clone(),
                        max_visits: rule.max_visits,
                        retry_at: retry_at.unwrap_or(now),
                    },
                    grace: group.grace,
                    lunch_available: false,
                })
            }
        }
    }
}

fn evaluate_work_hours(
    group: &PolicyGroup,
    rule: &WorkHoursRule,
    state: &mut EngineState,
    now: DateTime<Local>,
) -> EvalOutcome {
    if let Some(evening) = &rule.evening {
        if evening.window.contains(&now) {
            return EvalOutcome::decision(Decision::Denied {
                reason: DenyReason::EveningBlock {
                    group: group.id.clone(),
                },
                grace: evening.grace,
                lunch_available: false,
            });
        }
    }

    if !rule.window.contains(&now) {
        // Outside every restricted window
        return EvalOutcome::decision(Decision::unconditional());
    }

    match state.day_counters.first_access.get(&group.id).copied() {
        None => {
            // First access today anchors the allowance
            state
                .day_counters
                .first_access
                .insert(group.id.clone(), now);
            EvalOutcome {
                decision: Decision::Allowed {
                    remaining: None,
                    allowance_remaining: Some(rule.allowance),
                },
                dirty: true,
                granted: None,
            }
        }
        Some(first) => {
            let used = elapsed_since(first, now);
            if used < rule.allowance {
                EvalOutcome::decision(Decision::Allowed {
                    remaining: None,
                    allowance_remaining: Some(rule.allowance - used),
                })
            } else {
                let lunch_available = rule.lunch.as_ref().is_some_and(|lunch| {
                    lunch.window.contains(&now)
                        && state
                            .day_counters
                            .lunch_used
                            .get(&group.id)
                            .copied()
                            .unwrap_or(0)
                            < lunch.max_per_day
                });

                EvalOutcome::decision(Decision::Denied {
                    reason: DenyReason::AllowanceExhausted {
                        group: group.id.clone(),
                        used,
                        allowance: rule.allowance,
                    },
                    grace: group.grace,
                    lunch_available,
                })
            }
        }
    }
}
