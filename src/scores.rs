use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::identity::Person;
use crate::resolve::{as_items, resolve_id, resolve_number, resolve_str};

const PERSON_ID_ALIASES: &[&str] = &["user_id", "userId", "student_id", "studentId", "id"];
const TIMESTAMP_ALIASES: &[&str] = &["date_time", "dateTime", "created_at", "createdAt", "date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Listening,
    Speaking,
    Reading,
    Writing,
}

impl Skill {
    pub const ALL: [Skill; 4] = [Skill::Listening, Skill::Speaking, Skill::Reading, Skill::Writing];

    pub fn as_str(self) -> &'static str {
        match self {
            Skill::Listening => "listening",
            Skill::Speaking => "speaking",
            Skill::Reading => "reading",
            Skill::Writing => "writing",
        }
    }

    pub fn parse(s: &str) -> Option<Skill> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listening" => Some(Skill::Listening),
            "speaking" => Some(Skill::Speaking),
            "reading" => Some(Skill::Reading),
            "writing" => Some(Skill::Writing),
            _ => None,
        }
    }

    /// Aliases for a skill's snapshot score on a dashboard-feed entry:
    /// nested under a `scores` sub-object, flat, or suffixed.
    fn snapshot_aliases(self) -> &'static [&'static str] {
        match self {
            Skill::Listening => &[
                "scores.listening",
                "listening",
                "listening_score",
                "listeningScore",
            ],
            Skill::Speaking => &[
                "scores.speaking",
                "speaking",
                "speaking_score",
                "speakingScore",
            ],
            Skill::Reading => &["scores.reading", "reading", "reading_score", "readingScore"],
            Skill::Writing => &["scores.writing", "writing", "writing_score", "writingScore"],
        }
    }

    /// Aliases for the score on one attempt record from this skill's result
    /// feed. The skill-qualified names win over the generic ones.
    fn attempt_aliases(self) -> &'static [&'static str] {
        match self {
            Skill::Listening => &["listening_score", "listeningScore", "score", "points"],
            Skill::Speaking => &["speaking_score", "speakingScore", "score", "points"],
            Skill::Reading => &["reading_score", "readingScore", "score", "points"],
            Skill::Writing => &["writing_score", "writingScore", "score", "points"],
        }
    }
}

/// One scored submission for one skill by one person.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub person_id: String,
    pub skill: Skill,
    pub score: f64,
    pub recorded_at: Option<NaiveDateTime>,
    pub raw_timestamp: Option<String>,
}

/// Reconciled per-person scores. A missing skill reads as 0, which the source
/// model also uses for a genuine zero; `overall` is the unweighted mean of the
/// strictly-positive skills and absent when there are none, so an unmeasured
/// person never shows a misleading 0 overall.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub listening: f64,
    pub speaking: f64,
    pub reading: f64,
    pub writing: f64,
    #[serde(rename = "overallScore", skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
}

impl Default for ScoreRecord {
    fn default() -> Self {
        ScoreRecord {
            listening: 0.0,
            speaking: 0.0,
            reading: 0.0,
            writing: 0.0,
            overall: None,
        }
    }
}

impl ScoreRecord {
    pub fn get(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Listening => self.listening,
            Skill::Speaking => self.speaking,
            Skill::Reading => self.reading,
            Skill::Writing => self.writing,
        }
    }

    fn set(&mut self, skill: Skill, score: f64) {
        let v = clamp_score(score);
        match skill {
            Skill::Listening => self.listening = v,
            Skill::Speaking => self.speaking = v,
            Skill::Reading => self.reading = v,
            Skill::Writing => self.writing = v,
        }
    }

    fn finish(&mut self) {
        let positive: Vec<f64> = Skill::ALL
            .iter()
            .map(|s| self.get(*s))
            .filter(|v| *v > 0.0)
            .collect();
        self.overall = if positive.is_empty() {
            None
        } else {
            Some(positive.iter().sum::<f64>() / positive.len() as f64)
        };
    }
}

fn clamp_score(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Parses one per-skill result feed into attempt records. Entries without a
/// person id or a usable score are dropped with a warning rather than failing
/// the feed.
pub fn parse_attempts(skill: Skill, feed: &Value) -> Vec<Attempt> {
    let Some(items) = as_items(feed) else {
        if !feed.is_null() {
            warn!(skill = skill.as_str(), "skill feed is not a list, treating as empty");
        }
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|raw| {
            let Some(person_id) = resolve_id(raw, PERSON_ID_ALIASES) else {
                warn!(skill = skill.as_str(), "attempt record without person id, dropped");
                return None;
            };
            let score = resolve_number(raw, skill.attempt_aliases())?;
            let raw_timestamp = resolve_str(raw, TIMESTAMP_ALIASES);
            let recorded_at = raw_timestamp.as_deref().and_then(parse_timestamp);
            Some(Attempt {
                person_id,
                skill,
                score: clamp_score(score),
                recorded_at,
                raw_timestamp,
            })
        })
        .collect()
}

/// Attempt timestamps come in a handful of formats; an unparseable one ranks
/// earliest rather than erroring out.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Merges dashboard snapshot scores and attempt-feed scores into one record
/// per known person. Attempts supersede snapshots per skill, most recent
/// first; ties and unparseable timestamps resolve to the later feed entry.
/// Pure over its inputs: calling it twice yields identical maps.
pub fn reconcile(
    people: &[Person],
    dashboard: &Value,
    attempts: &[Attempt],
) -> BTreeMap<String, ScoreRecord> {
    let mut scores: BTreeMap<String, ScoreRecord> = people
        .iter()
        .map(|p| (p.id.clone(), ScoreRecord::default()))
        .collect();

    for (person_id, entry) in snapshot_entries(dashboard) {
        let Some(record) = scores.get_mut(&person_id) else {
            debug!(person = %person_id, "dashboard snapshot for unknown person, dropped");
            continue;
        };
        for skill in Skill::ALL {
            if let Some(v) = resolve_number(&entry, skill.snapshot_aliases()) {
                record.set(skill, v);
            }
        }
    }

    for attempt in latest_attempts(attempts) {
        if let Some(record) = scores.get_mut(&attempt.person_id) {
            record.set(attempt.skill, attempt.score);
        }
    }

    for record in scores.values_mut() {
        record.finish();
    }
    scores
}

/// Flattens the dashboard feed to `(person_id, snapshot entry)` pairs. Both
/// documented shapes are supported: `{classes:[{students, teachers}]}` and a
/// flat array or object of per-person snapshots.
fn snapshot_entries(dashboard: &Value) -> Vec<(String, Value)> {
    let mut out: Vec<(String, Value)> = Vec::new();

    if let Some(classes) = dashboard.get("classes").and_then(Value::as_array) {
        for class in classes {
            for list in ["students", "teachers"] {
                if let Some(entries) = class.get(list).and_then(Value::as_array) {
                    for entry in entries {
                        if let Some(id) = resolve_id(entry, PERSON_ID_ALIASES) {
                            out.push((id, entry.clone()));
                        }
                    }
                }
            }
        }
        return out;
    }

    if let Some(items) = as_items(dashboard) {
        for entry in items {
            if let Some(id) = resolve_id(entry, PERSON_ID_ALIASES) {
                out.push((id, entry.clone()));
            }
        }
        return out;
    }

    if let Value::Object(map) = dashboard {
        for (key, entry) in map {
            if !entry.is_object() {
                continue;
            }
            let id = resolve_id(entry, PERSON_ID_ALIASES).unwrap_or_else(|| key.clone());
            out.push((id, entry.clone()));
        }
    }
    out
}

/// Reduces attempts to the most recent one per `(person, skill)`. Feed order
/// breaks timestamp ties, later entry winning.
fn latest_attempts(attempts: &[Attempt]) -> Vec<&Attempt> {
    let mut best: BTreeMap<(&str, Skill), &Attempt> = BTreeMap::new();
    for attempt in attempts {
        let key = (attempt.person_id.as_str(), attempt.skill);
        match best.get(&key) {
            Some(current) if attempt.recorded_at < current.recorded_at => {}
            _ => {
                best.insert(key, attempt);
            }
        }
    }
    best.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::normalize;
    use serde_json::json;

    fn people(raws: Vec<serde_json::Value>) -> Vec<Person> {
        raws.iter().filter_map(normalize).collect()
    }

    #[test]
    fn snapshot_shapes_nested_flat_and_object() {
        let ppl = people(vec![json!({ "id": 1 }), json!({ "id": 2 })]);

        let nested = json!({ "classes": [
            { "class_name": "9-A", "students": [{ "id": 1, "scores": { "reading": 80 } }], "teachers": [] }
        ]});
        assert_eq!(reconcile(&ppl, &nested, &[])["1"].reading, 80.0);

        let flat = json!([{ "user_id": 2, "reading_score": "75.00" }]);
        assert_eq!(reconcile(&ppl, &flat, &[])["2"].reading, 75.0);

        let object = json!({ "2": { "readingScore": 60 } });
        assert_eq!(reconcile(&ppl, &object, &[])["2"].reading, 60.0);
    }

    #[test]
    fn most_recent_attempt_supersedes_snapshot_per_skill() {
        let ppl = people(vec![json!({ "id": 1 })]);
        let dashboard = json!([{ "id": 1, "speaking": 40, "listening": 30 }]);
        let attempts = parse_attempts(
            Skill::Speaking,
            &json!([
                { "user_id": 1, "speaking_score": 20, "date_time": "2024-01-01 10:00:00" },
                { "user_id": 1, "speaking_score": 55, "date_time": "2024-03-01 10:00:00" }
            ]),
        );
        let scores = reconcile(&ppl, &dashboard, &attempts);
        // speaking from the newest attempt, listening untouched from snapshot
        assert_eq!(scores["1"].speaking, 55.0);
        assert_eq!(scores["1"].listening, 30.0);
    }

    #[test]
    fn older_attempt_does_not_supersede_newer() {
        let ppl = people(vec![json!({ "id": 1 })]);
        let attempts = parse_attempts(
            Skill::Reading,
            &json!([
                { "user_id": 1, "score": 90, "created_at": "2024-06-01T10:00:00" },
                { "user_id": 1, "score": 10, "created_at": "2024-01-01T10:00:00" }
            ]),
        );
        assert_eq!(reconcile(&ppl, &json!(null), &attempts)["1"].reading, 90.0);
    }

    #[test]
    fn timestamp_fallback_chain() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00").is_some());
        assert!(parse_timestamp("2024-05-01").is_some());
        assert!(parse_timestamp("last tuesday").is_none());

        let attempts = parse_attempts(
            Skill::Writing,
            &json!([
                { "user_id": 1, "score": 15, "date": "2024-02-01" },
                { "user_id": 1, "score": 25, "created_at": "2024-02-02 09:00:00" }
            ]),
        );
        let ppl = people(vec![json!({ "id": 1 })]);
        assert_eq!(reconcile(&ppl, &json!(null), &attempts)["1"].writing, 25.0);
    }

    #[test]
    fn overall_ignores_zero_skills() {
        let ppl = people(vec![json!({ "id": 1 })]);
        let dashboard = json!([{ "id": 1, "listening": 0, "speaking": 0, "reading": 70, "writing": 0 }]);
        let scores = reconcile(&ppl, &dashboard, &[]);
        assert_eq!(scores["1"].overall, Some(70.0));
    }

    #[test]
    fn overall_is_absent_without_positive_evidence() {
        let ppl = people(vec![json!({ "id": 1 })]);
        let scores = reconcile(&ppl, &json!(null), &[]);
        assert_eq!(scores["1"].overall, None);
        let out = serde_json::to_value(&scores["1"]).unwrap();
        assert!(out.get("overallScore").is_none());
    }

    #[test]
    fn overall_means_the_positive_subset() {
        let ppl = people(vec![json!({ "id": 1 })]);
        let dashboard = json!([{ "id": 1, "reading": 80, "writing": 60 }]);
        assert_eq!(reconcile(&ppl, &dashboard, &[])["1"].overall, Some(70.0));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let ppl = people(vec![json!({ "id": 1, "name": "Amy" }), json!({ "id": 2 })]);
        let dashboard = json!([{ "id": 1, "reading": 50 }]);
        let attempts = parse_attempts(
            Skill::Reading,
            &json!([{ "user_id": 2, "score": 66, "date": "2024-01-05" }]),
        );
        let a = reconcile(&ppl, &dashboard, &attempts);
        let b = reconcile(&ppl, &dashboard, &attempts);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn scores_clamp_into_range() {
        let ppl = people(vec![json!({ "id": 1 })]);
        let dashboard = json!([{ "id": 1, "reading": 140, "writing": -3 }]);
        let scores = reconcile(&ppl, &dashboard, &[]);
        assert_eq!(scores["1"].reading, 100.0);
        assert_eq!(scores["1"].writing, 0.0);
    }

    #[test]
    fn malformed_feed_contributes_nothing() {
        assert!(parse_attempts(Skill::Listening, &json!({ "error": "boom" })).is_empty());
        assert!(parse_attempts(Skill::Listening, &json!(null)).is_empty());
        // records without id or score are dropped, the rest survive
        let attempts = parse_attempts(
            Skill::Listening,
            &json!([
                { "score": 10 },
                { "user_id": 1, "remark": "no score" },
                { "user_id": 1, "score": 44 }
            ]),
        );
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].score, 44.0);
    }
}
