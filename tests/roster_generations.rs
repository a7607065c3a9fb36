
use serde_json::json;
use test_support::{begin, request_err, request_ok, spawn_sidecar};

#[test]
fn superseded_generation_is_rejected() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let first = begin(&mut stdin, &mut reader, "1");
    let second = begin(&mut stdin, &mut reader, "2");
    assert!(second > first);

    // A response from the superseded fetch round must not overwrite state.
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "roster.apply",
        json!({ "generation": first, "users": [{ "id": 1 }] }),
    );
    assert_eq!(code, "stale_generation");

    let health = request_ok(&mut stdin, &mut reader, "4", "health", json!({}));
    assert_eq!(health.get("hasSnapshot").and_then(|v| v.as_bool()), Some(false));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "roster.apply",
        json!({ "generation": second, "users": [{ "id": 1 }] }),
    );
    assert_eq!(applied.get("personCount").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn failed_apply_clears_previous_snapshot() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let generation = begin(&mut stdin, &mut reader, "1");
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roster.apply",
        json!({ "generation": generation, "users": [{ "id": 1, "class": "9-A" }] }),
    );

    // Switching context: users list fails upstream. Stale roster must not
    // survive under the new context.
    let generation = begin(&mut stdin, &mut reader, "3");
    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "roster.apply",
        json!({ "generation": generation, "users": { "message": "forbidden for this organization" } }),
    );
    assert_eq!(code, "bad_source");
    assert_eq!(message, "forbidden for this organization");

    let classes = request_ok(&mut stdin, &mut reader, "5", "roster.classes", json!({}));
    assert_eq!(
        classes.get("classes").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
}

#[test]
fn retry_with_same_generation_is_idempotent() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let generation = begin(&mut stdin, &mut reader, "1");

    let payload = json!({
        "generation": generation,
        "users": [
            { "id": 1, "first_name": "Amy", "role": "teacher", "class": "9-A" },
            { "id": 2, "first_name": "Bo", "class": "9-A" }
        ],
        "dashboard": [{ "id": 2, "reading": 61 }],
        "skillFeeds": { "writing": [{ "user_id": 1, "score": 88, "date": "2024-04-04" }] }
    });

    request_ok(&mut stdin, &mut reader, "2", "roster.apply", payload.clone());
    let rows_a = request_ok(&mut stdin, &mut reader, "3", "roster.rows", json!({}));

    request_ok(&mut stdin, &mut reader, "4", "roster.apply", payload);
    let rows_b = request_ok(&mut stdin, &mut reader, "5", "roster.rows", json!({}));

    assert_eq!(rows_a, rows_b);
}
