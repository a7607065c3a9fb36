use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::resolve::{as_bool_signal, as_items, resolve, resolve_id, resolve_str, BoolSignal};

const ID_ALIASES: &[&str] = &["id", "user_id", "userId", "student_id", "studentId"];
const EMAIL_ALIASES: &[&str] = &["email", "email_address", "emailAddress"];
const ORG_ID_ALIASES: &[&str] = &[
    "organization_id",
    "organisation_id",
    "organizationId",
    "organisationId",
    "org_id",
];
const ROLE_ALIASES: &[&str] = &["role", "user_role", "userRole"];
const CLASS_ALIASES: &[&str] = &["class", "classes", "class_name", "className"];
const STATUS_ALIASES: &[&str] = &["is_active", "isActive", "active", "status"];
const DELETED_ALIASES: &[&str] = &["deleted_at", "deletedAt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Principal,
    Administrator,
}

impl Role {
    pub fn parse(raw: Option<&str>) -> Role {
        let Some(raw) = raw else {
            return Role::Student;
        };
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("admin") {
            return Role::Administrator;
        }
        match lower.as_str() {
            "manager" | "principal" => Role::Principal,
            "teacher" => Role::Teacher,
            _ => Role::Student,
        }
    }

    /// Staff roles are listed as class members but never as students.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Teacher | Role::Principal | Role::Administrator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Principal => "principal",
            Role::Administrator => "administrator",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub organization_id: Option<String>,
    pub class_memberships: Vec<String>,
    pub active: bool,
}

/// Canonicalizes one raw user record. Returns `None` only when no id alias
/// resolves at all; every other malformed field falls back to its documented
/// default instead of failing.
pub fn normalize(raw: &Value) -> Option<Person> {
    let Some(id) = resolve_id(raw, ID_ALIASES) else {
        warn!("skipping user record without any id field");
        return None;
    };

    let email = resolve_str(raw, EMAIL_ALIASES).unwrap_or_default();
    let name = derive_name(raw, &email);
    let role = Role::parse(resolve_str(raw, ROLE_ALIASES).as_deref());
    let organization_id = resolve_id(raw, ORG_ID_ALIASES);
    let class_memberships = resolve(raw, CLASS_ALIASES)
        .map(parse_class_memberships)
        .unwrap_or_default();
    let active = derive_active(raw, &id);

    Some(Person {
        id,
        name,
        email,
        role,
        organization_id,
        class_memberships,
        active,
    })
}

pub fn normalize_all(payload: &Value) -> Vec<Person> {
    let Some(items) = as_items(payload) else {
        return Vec::new();
    };
    items.iter().filter_map(normalize).collect()
}

fn derive_name(raw: &Value, email: &str) -> String {
    let first = resolve_str(raw, &["first_name", "firstName"]).unwrap_or_default();
    let last = resolve_str(raw, &["last_name", "lastName"]).unwrap_or_default();
    let combined = format!("{} {}", first, last).trim().to_string();
    if !combined.is_empty() {
        return combined;
    }
    if let Some(name) = resolve_str(raw, &["name", "full_name", "fullName"]) {
        return name;
    }
    let local = email.split('@').next().unwrap_or("").trim();
    if !local.is_empty() {
        return local.to_string();
    }
    "Unknown".to_string()
}

/// Active flag, first matching rule wins:
/// 1. non-empty `deleted_at` forces inactive;
/// 2. an explicit boolean status field is used directly;
/// 3. a numeric status field, 1 active / 0 inactive;
/// 4. a string status field matched against the recognized vocabularies
///    (unrecognized values warn and default to active);
/// 5. no signal at all means active. The source system omits the field for
///    ordinary live accounts, so absence is not "unknown".
///
/// Signals rank by type, not by which alias carries them: a record with both
/// `is_active: "no"` and `active: true` is active.
fn derive_active(raw: &Value, id: &str) -> bool {
    if resolve(raw, DELETED_ALIASES).is_some() {
        return false;
    }
    let present: Vec<&Value> = STATUS_ALIASES
        .iter()
        .filter_map(|&alias| resolve(raw, &[alias]))
        .collect();
    let signal = present
        .iter()
        .copied()
        .find(|v| v.is_boolean())
        .or_else(|| present.iter().copied().find(|v| v.is_number()))
        .or_else(|| present.iter().copied().find(|v| v.is_string()));
    match signal.and_then(as_bool_signal) {
        Some(BoolSignal::Value(b)) => b,
        Some(BoolSignal::Unrecognized(s)) => {
            warn!(person = id, value = %s, "unrecognized active-status value, defaulting to active");
            true
        }
        None => true,
    }
}

/// The raw `class` field arrives as a single string, an array, or a
/// JSON-encoded array-as-string. All three flatten to trimmed, deduplicated
/// names; empty entries are dropped.
pub fn parse_class_memberships(v: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    collect_class_names(v, &mut out, &mut seen);
    out
}

fn collect_class_names(v: &Value, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    match v {
        Value::Array(items) => {
            for item in items {
                collect_class_names(item, out, seen);
            }
        }
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return;
            }
            if t.starts_with('[') {
                if let Ok(parsed) = serde_json::from_str::<Value>(t) {
                    collect_class_names(&parsed, out, seen);
                    return;
                }
            }
            if seen.insert(t.to_string()) {
                out.push(t.to_string());
            }
        }
        _ => {}
    }
}
