use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::orgs;
use serde_json::{json, Value};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "orgs.resolve" => Some(handle_resolve(state, req)),
        _ => None,
    }
}

/// Resolves an organization id against the applied org list. Works without a
/// snapshot too: the resolver then echoes the id, so the dropdown never
/// renders blank while orgs are still loading.
fn handle_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let org_id = req.params.get("orgId").and_then(|v| match v {
        Value::String(s) => Some(s.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let known = state
        .snapshot
        .as_ref()
        .map(|s| s.organizations.as_slice())
        .unwrap_or(&[]);
    let name = orgs::resolve_name(org_id.as_deref(), known);
    ok(&req.id, json!({ "name": name }))
}
