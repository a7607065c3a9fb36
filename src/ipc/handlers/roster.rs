use crate::identity::Person;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::orgs;
use crate::scores::ScoreRecord;
use crate::snapshot;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::warn;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.apply" => Some(handle_apply(state, req)),
        "roster.classes" => Some(handle_classes(state, req)),
        "roster.class.get" => Some(handle_class_get(state, req)),
        "roster.person" => Some(handle_person(state, req)),
        _ => None,
    }
}

fn handle_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(generation) = req.params.get("generation").and_then(Value::as_u64) else {
        return err(&req.id, "bad_params", "missing params.generation", None);
    };
    if generation != state.latest_generation {
        return err(
            &req.id,
            "stale_generation",
            "apply does not carry the latest issued generation",
            Some(json!({ "latest": state.latest_generation, "got": generation })),
        );
    }
    let Some(users) = req.params.get("users") else {
        return err(&req.id, "bad_params", "missing params.users", None);
    };

    match snapshot::build(
        generation,
        users,
        req.params.get("organizations"),
        req.params.get("dashboard"),
        req.params.get("skillFeeds"),
    ) {
        Ok(snap) => {
            let scored = snap
                .scores
                .values()
                .filter(|s| s.overall.is_some())
                .count();
            let result = json!({
                "generation": snap.generation,
                "personCount": snap.people.len(),
                "classCount": snap.class_groups.len(),
                "scoredCount": scored,
            });
            state.snapshot = Some(snap);
            ok(&req.id, result)
        }
        Err(e) => {
            // Total-source failure: never keep showing data from an earlier
            // context once its replacement failed to load.
            warn!(code = e.code, message = %e.message, "apply failed, clearing snapshot");
            state.snapshot = None;
            err(&req.id, e.code, e.message, None)
        }
    }
}

fn handle_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(snap) = state.snapshot.as_ref() else {
        // The class list section stays resilient: no snapshot renders empty.
        return ok(&req.id, json!({ "classes": [] }));
    };
    let classes: Vec<Value> = snap
        .class_groups
        .values()
        .map(|g| {
            json!({
                "className": g.class_name,
                "teacherName": g.teacher_name,
                "studentCount": g.students.len(),
                "memberCount": g.all_members.len(),
            })
        })
        .collect();
    ok(&req.id, json!({ "classes": classes }))
}

fn handle_class_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(snap) = state.snapshot.as_ref() else {
        return err(&req.id, "no_snapshot", "apply sources first", None);
    };
    let Some(class_name) = req.params.get("className").and_then(Value::as_str) else {
        return err(&req.id, "bad_params", "missing params.className", None);
    };
    let Some(group) = snap.class_groups.get(class_name.trim()) else {
        return err(&req.id, "not_found", "class not found", None);
    };

    let members: Vec<Value> = group
        .all_members
        .iter()
        .map(|p| member_json(p, &snap.scores))
        .collect();
    let students: Vec<Value> = group
        .students
        .iter()
        .map(|p| member_json(p, &snap.scores))
        .collect();
    ok(
        &req.id,
        json!({
            "className": group.class_name,
            "teacherName": group.teacher_name,
            "students": students,
            "allMembers": members,
        }),
    )
}

fn handle_person(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(snap) = state.snapshot.as_ref() else {
        return err(&req.id, "no_snapshot", "apply sources first", None);
    };
    let Some(person_id) = req.params.get("personId").and_then(|v| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }) else {
        return err(&req.id, "bad_params", "missing params.personId", None);
    };
    let Some(person) = snap.people.iter().find(|p| p.id == person_id) else {
        return err(&req.id, "not_found", "person not found", None);
    };

    let scores = snap.scores.get(&person.id).cloned().unwrap_or_default();
    ok(
        &req.id,
        json!({
            "person": serde_json::to_value(person).unwrap_or(Value::Null),
            "scores": serde_json::to_value(&scores).unwrap_or(Value::Null),
            "organizationName": orgs::resolve_name(
                person.organization_id.as_deref(),
                &snap.organizations
            ),
        }),
    )
}

fn member_json(person: &Person, scores: &BTreeMap<String, ScoreRecord>) -> Value {
    let mut v = serde_json::to_value(person).unwrap_or(Value::Null);
    let record = scores.get(&person.id).cloned().unwrap_or_default();
    if let Value::Object(map) = &mut v {
        map.insert(
            "scores".to_string(),
            serde_json::to_value(&record).unwrap_or(Value::Null),
        );
    }
    v
}
