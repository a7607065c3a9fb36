use serde::Serialize;
use serde_json::Value;

use crate::resolve::{as_items, resolve_id, resolve_str};

pub const NOT_SELECTED: &str = "Not selected";

const ORG_ID_ALIASES: &[&str] = &["id", "organisation_id", "organization_id"];
const ORG_NAME_ALIASES: &[&str] = &[
    "organisation",
    "name",
    "organisation_name",
    "organization_name",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub display_name: String,
    /// Every id alias present on the raw record. Endpoints disagree on which
    /// id field they send back, so lookups match against all of them.
    #[serde(skip)]
    ids: Vec<String>,
}

impl Organization {
    fn matches(&self, id: &str) -> bool {
        self.ids.iter().any(|x| x == id)
    }
}

pub fn normalize_orgs(payload: &Value) -> Vec<Organization> {
    let Some(items) = as_items(payload) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|raw| {
            let mut ids: Vec<String> = Vec::new();
            for &alias in ORG_ID_ALIASES {
                if let Some(id) = resolve_id(raw, &[alias]) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            let id = ids.first()?.clone();
            // An org row with no usable name alias still resolves to its id.
            let display_name = resolve_str(raw, ORG_NAME_ALIASES).unwrap_or_else(|| id.clone());
            Some(Organization { id, display_name, ids })
        })
        .collect()
}

/// Display name for an organization id. "Not selected" for a missing id, the
/// raw id while the org list has not loaded yet (the UI never renders blank),
/// the resolved name once it has.
pub fn resolve_name(org_id: Option<&str>, orgs: &[Organization]) -> String {
    let id = org_id.map(str::trim).unwrap_or("");
    if id.is_empty() || id.eq_ignore_ascii_case("undefined") || id.eq_ignore_ascii_case("null") {
        return NOT_SELECTED.to_string();
    }
    if orgs.is_empty() {
        return id.to_string();
    }
    match orgs.iter().find(|o| o.matches(id)) {
        Some(org) => org.display_name.clone(),
        None => id.to_string(),
    }
}
