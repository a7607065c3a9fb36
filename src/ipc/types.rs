use serde::Deserialize;

use crate::snapshot::RosterSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    /// Latest reconciled view, replaced wholesale by `roster.apply`.
    pub snapshot: Option<RosterSnapshot>,
    /// Monotonic request-generation counter. An apply carrying anything but
    /// the latest issued generation is a superseded fetch and is rejected.
    pub latest_generation: u64,
}
