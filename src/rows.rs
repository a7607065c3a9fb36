use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::grouping::ClassGroup;
use crate::identity::Person;
use crate::orgs::{self, Organization};
use crate::scores::{Attempt, ScoreRecord, Skill};

pub const DEFAULT_PAGE_SIZE: i64 = 25;

#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub class: Option<String>,
    pub skill: Option<Skill>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct RowQuery {
    pub sort_by: Option<String>,
    pub sort_dir: SortDir,
    pub page: i64,
    pub page_size: i64,
}

impl Default for RowQuery {
    fn default() -> Self {
        RowQuery {
            sort_by: None,
            sort_dir: SortDir::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub fn parse_filters(params: Option<&Value>) -> Filters {
    let Some(v) = params else {
        return Filters::default();
    };
    Filters {
        class: v
            .get("class")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        skill: v.get("skill").and_then(Value::as_str).and_then(Skill::parse),
        search: v
            .get("search")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    }
}

pub fn parse_query(params: Option<&Value>) -> RowQuery {
    let mut q = RowQuery::default();
    let Some(v) = params else {
        return q;
    };
    q.sort_by = v
        .get("sortBy")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(dir) = v.get("sortDir").and_then(Value::as_str) {
        if dir.eq_ignore_ascii_case("desc") {
            q.sort_dir = SortDir::Desc;
        }
    }
    if let Some(p) = v.get("page").and_then(Value::as_i64) {
        q.page = p;
    }
    if let Some(ps) = v.get("pageSize").and_then(Value::as_i64) {
        q.page_size = ps.max(1);
    }
    q
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub person_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub organization_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(flatten)]
    pub scores: ScoreRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<Skill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_recorded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsPage {
    pub rows: Vec<Row>,
    pub page: i64,
    pub page_size: i64,
    pub total_rows: i64,
    pub total_pages: i64,
}

/// Final table shape for the UI. Class filter: one row per class member.
/// Skill filter without a class filter: one row per attempt for that skill.
/// Neither: one row per person in the flat roster, which is how people with
/// no class membership stay reachable.
pub fn build_rows(
    people: &[Person],
    groups: &BTreeMap<String, ClassGroup>,
    scores: &BTreeMap<String, ScoreRecord>,
    attempts: &[Attempt],
    organizations: &[Organization],
    filters: &Filters,
    query: &RowQuery,
) -> RowsPage {
    let mut rows: Vec<Row> = if let Some(class) = filters.class.as_deref() {
        match groups.get(class.trim()) {
            Some(g) => g
                .all_members
                .iter()
                .map(|p| person_row(p, Some(&g.class_name), scores, organizations))
                .collect(),
            None => Vec::new(),
        }
    } else if let Some(skill) = filters.skill {
        let by_id: BTreeMap<&str, &Person> =
            people.iter().map(|p| (p.id.as_str(), p)).collect();
        attempts
            .iter()
            .filter(|a| a.skill == skill)
            .map(|a| attempt_row(a, by_id.get(a.person_id.as_str()).copied(), scores, organizations))
            .collect()
    } else {
        people
            .iter()
            .map(|p| person_row(p, None, scores, organizations))
            .collect()
    };

    if let Some(needle) = filters.search.as_deref() {
        let needle = needle.to_lowercase();
        rows.retain(|r| {
            r.name.to_lowercase().contains(&needle) || r.email.to_lowercase().contains(&needle)
        });
    }

    if let Some(key) = query.sort_by.as_deref() {
        // Stable sort with a flipped comparator: equal rows keep their
        // pre-sort (reconciliation) order in both directions.
        rows.sort_by(|a, b| match query.sort_dir {
            SortDir::Asc => compare_rows(a, b, key),
            SortDir::Desc => compare_rows(a, b, key).reverse(),
        });
    }

    paginate(rows, query)
}

fn person_row(
    person: &Person,
    class_name: Option<&str>,
    scores: &BTreeMap<String, ScoreRecord>,
    organizations: &[Organization],
) -> Row {
    Row {
        person_id: person.id.clone(),
        name: person.name.clone(),
        email: person.email.clone(),
        role: person.role.as_str().to_string(),
        active: person.active,
        organization_name: orgs::resolve_name(person.organization_id.as_deref(), organizations),
        class_name: class_name.map(|c| c.to_string()),
        scores: scores.get(&person.id).cloned().unwrap_or_default(),
        skill: None,
        attempt_score: None,
        attempt_recorded_at: None,
    }
}

fn attempt_row(
    attempt: &Attempt,
    person: Option<&Person>,
    scores: &BTreeMap<String, ScoreRecord>,
    organizations: &[Organization],
) -> Row {
    let mut row = match person {
        Some(p) => person_row(p, None, scores, organizations),
        // Attempt feeds can reference people absent from the user list; the
        // row still renders with placeholder identity.
        None => Row {
            person_id: attempt.person_id.clone(),
            name: "Unknown".to_string(),
            email: String::new(),
            role: "student".to_string(),
            active: true,
            organization_name: orgs::NOT_SELECTED.to_string(),
            class_name: None,
            scores: ScoreRecord::default(),
            skill: None,
            attempt_score: None,
            attempt_recorded_at: None,
        },
    };
    row.skill = Some(attempt.skill);
    row.attempt_score = Some(attempt.score);
    row.attempt_recorded_at = attempt.raw_timestamp.clone();
    row
}

fn compare_rows(a: &Row, b: &Row, key: &str) -> Ordering {
    match key {
        "name" => caseless(&a.name, &b.name),
        "email" => caseless(&a.email, &b.email),
        "role" => caseless(&a.role, &b.role),
        "organizationName" | "organization" => {
            caseless(&a.organization_name, &b.organization_name)
        }
        "class" | "className" => caseless(
            a.class_name.as_deref().unwrap_or(""),
            b.class_name.as_deref().unwrap_or(""),
        ),
        "active" => (a.active as u8).cmp(&(b.active as u8)),
        "overall" | "overallScore" => numeric(a.scores.overall, b.scores.overall),
        "listening" => numeric(Some(a.scores.listening), Some(b.scores.listening)),
        "speaking" => numeric(Some(a.scores.speaking), Some(b.scores.speaking)),
        "reading" => numeric(Some(a.scores.reading), Some(b.scores.reading)),
        "writing" => numeric(Some(a.scores.writing), Some(b.scores.writing)),
        "score" | "attemptScore" => numeric(a.attempt_score, b.attempt_score),
        "recordedAt" | "attemptRecordedAt" => caseless(
            a.attempt_recorded_at.as_deref().unwrap_or(""),
            b.attempt_recorded_at.as_deref().unwrap_or(""),
        ),
        _ => Ordering::Equal,
    }
}

fn caseless(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

// Unmeasured (None) sorts below every measured value.
fn numeric(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn paginate(rows: Vec<Row>, query: &RowQuery) -> RowsPage {
    let total_rows = rows.len() as i64;
    let page_size = query.page_size.max(1);
    let total_pages = (total_rows + page_size - 1) / page_size;
    // Out-of-range pages clamp instead of erroring; an empty set is page 1 of 0.
    let page = query.page.clamp(1, total_pages.max(1));
    let start = ((page - 1) * page_size) as usize;
    let rows: Vec<Row> = rows
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();
    RowsPage {
        rows,
        page,
        page_size,
        total_rows,
        total_pages,
    }
}
