use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::grouping::{self, ClassGroup};
use crate::identity::{self, Person};
use crate::orgs::{self, Organization};
use crate::resolve::{as_items, resolve_str};
use crate::scores::{self, Attempt, ScoreRecord, Skill};

/// One reconciled view of all sources, rebuilt wholesale on every apply.
/// Nothing is patched incrementally and nothing survives across applies, so
/// the same inputs always produce the same snapshot.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    pub generation: u64,
    pub people: Vec<Person>,
    pub organizations: Vec<Organization>,
    pub class_groups: BTreeMap<String, ClassGroup>,
    pub scores: BTreeMap<String, ScoreRecord>,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug)]
pub struct SourceError {
    pub code: &'static str,
    pub message: String,
}

impl SourceError {
    fn bad_source(message: impl Into<String>) -> Self {
        SourceError {
            code: "bad_source",
            message: message.into(),
        }
    }
}

/// Pulls a human-readable message out of an upstream error body when one is
/// there to be found.
fn upstream_message(payload: &Value, fallback: &str) -> String {
    resolve_str(payload, &["message", "error.message", "error", "detail"])
        .unwrap_or_else(|| fallback.to_string())
}

/// Builds a snapshot from raw source payloads.
///
/// The users list is the backbone: if it does not yield a list, the whole
/// apply fails (total-source failure) and the caller clears any held
/// snapshot. The organizations list fails the same way when present but
/// ill-typed; omitting it entirely just means names resolve to raw ids.
/// Skill feeds and the dashboard feed are isolated: a missing or malformed
/// one contributes nothing instead of failing the apply.
pub fn build(
    generation: u64,
    users: &Value,
    organizations: Option<&Value>,
    dashboard: Option<&Value>,
    skill_feeds: Option<&Value>,
) -> Result<RosterSnapshot, SourceError> {
    if as_items(users).is_none() {
        return Err(SourceError::bad_source(upstream_message(
            users,
            "users payload is not a list",
        )));
    }
    let orgs = match organizations {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => {
            if as_items(v).is_none() {
                return Err(SourceError::bad_source(upstream_message(
                    v,
                    "organizations payload is not a list",
                )));
            }
            orgs::normalize_orgs(v)
        }
    };

    let people = identity::normalize_all(users);
    let class_groups = grouping::group(&people);

    let mut attempts: Vec<Attempt> = Vec::new();
    if let Some(feeds) = skill_feeds {
        for skill in Skill::ALL {
            if let Some(feed) = feeds.get(skill.as_str()) {
                attempts.extend(scores::parse_attempts(skill, feed));
            }
        }
    }

    let empty = Value::Null;
    let scores = scores::reconcile(&people, dashboard.unwrap_or(&empty), &attempts);

    info!(
        generation,
        people = people.len(),
        classes = class_groups.len(),
        attempts = attempts.len(),
        "snapshot reconciled"
    );

    Ok(RosterSnapshot {
        generation,
        people,
        organizations: orgs,
        class_groups,
        scores,
        attempts,
    })
}
