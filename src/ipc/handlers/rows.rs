use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::rows::{self, RowsPage};
use crate::scores::Skill;
use serde_json::{json, Value};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.rows" => Some(handle_rows(state, req)),
        "roster.attempts" => Some(handle_attempts(state, req)),
        _ => None,
    }
}

fn handle_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filters = rows::parse_filters(req.params.get("filters"));
    let query = rows::parse_query(req.params.get("query"));

    let Some(snap) = state.snapshot.as_ref() else {
        // The table section renders empty until sources are applied.
        let empty = RowsPage {
            rows: Vec::new(),
            page: 1,
            page_size: query.page_size,
            total_rows: 0,
            total_pages: 0,
        };
        return ok(&req.id, serde_json::to_value(&empty).unwrap_or(Value::Null));
    };

    let page = rows::build_rows(
        &snap.people,
        &snap.class_groups,
        &snap.scores,
        &snap.attempts,
        &snap.organizations,
        &filters,
        &query,
    );
    ok(&req.id, serde_json::to_value(&page).unwrap_or(Value::Null))
}

/// Read-through listing of already-applied attempt records, used by the
/// per-attempt detail expansion in the UI.
fn handle_attempts(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(snap) = state.snapshot.as_ref() else {
        return err(&req.id, "no_snapshot", "apply sources first", None);
    };
    let Some(skill) = req
        .params
        .get("skill")
        .and_then(Value::as_str)
        .and_then(Skill::parse)
    else {
        return err(&req.id, "bad_params", "missing or unknown params.skill", None);
    };
    let person_id = req.params.get("personId").and_then(|v| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let attempts: Vec<Value> = snap
        .attempts
        .iter()
        .filter(|a| a.skill == skill)
        .filter(|a| person_id.as_deref().map_or(true, |id| a.person_id == id))
        .map(|a| serde_json::to_value(a).unwrap_or(Value::Null))
        .collect();
    ok(&req.id, json!({ "attempts": attempts }))
}
