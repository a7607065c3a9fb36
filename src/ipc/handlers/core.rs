use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "sources.begin" => Some(handle_sources_begin(state, req)),
        _ => None,
    }
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "generation": state.latest_generation,
            "hasSnapshot": state.snapshot.is_some(),
        }),
    )
}

/// Issues a fresh request generation. The UI calls this before kicking off a
/// fetch round; only an apply carrying this generation will be accepted, so a
/// superseded in-flight round can never overwrite a newer one.
fn handle_sources_begin(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.latest_generation += 1;
    ok(&req.id, json!({ "generation": state.latest_generation }))
}
