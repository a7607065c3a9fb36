use serde_json::Value;

/// Looks up `record` by each alias in priority order and returns the first
/// value that is actually present: `null` and empty/whitespace strings count
/// as missing. An alias may contain a single `.` to address one nesting level
/// (`"scores.reading"`). Returns `None` when every alias misses; callers own
/// their defaults.
pub fn resolve<'a>(record: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    for alias in aliases {
        let found = match alias.split_once('.') {
            Some((outer, inner)) => record.get(outer).and_then(|v| v.get(inner)),
            None => record.get(alias),
        };
        if let Some(v) = found {
            if is_present(v) {
                return Some(v);
            }
        }
    }
    None
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

pub fn resolve_str(record: &Value, aliases: &[&str]) -> Option<String> {
    resolve(record, aliases)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Identifier fields arrive as strings or integers depending on the endpoint;
/// both normalize to one canonical string form.
pub fn resolve_id(record: &Value, aliases: &[&str]) -> Option<String> {
    match resolve(record, aliases)? {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_u64().map(|u| u.to_string())
            }
        }
        _ => None,
    }
}

/// Numeric fields may be string-encoded decimals ("72.00"). Non-finite values
/// are treated as missing.
pub fn resolve_number(record: &Value, aliases: &[&str]) -> Option<f64> {
    let v = resolve(record, aliases)?;
    number_of(v)
}

fn number_of(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() {
        Some(n)
    } else {
        None
    }
}

/// Interpretation of an explicit active/status value. Strings outside the two
/// recognized vocabularies surface as `Unrecognized` so the caller can warn
/// and apply its documented default.
#[derive(Debug, Clone, PartialEq)]
pub enum BoolSignal {
    Value(bool),
    Unrecognized(String),
}

pub fn as_bool_signal(v: &Value) -> Option<BoolSignal> {
    match v {
        Value::Bool(b) => Some(BoolSignal::Value(*b)),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Some(BoolSignal::Value(true)),
            Some(x) if x == 0.0 => Some(BoolSignal::Value(false)),
            Some(_) => Some(BoolSignal::Unrecognized(n.to_string())),
            None => None,
        },
        Value::String(s) => {
            let t = s.trim().to_ascii_lowercase();
            if t.is_empty() {
                return None;
            }
            match t.as_str() {
                "1" | "true" | "active" | "enabled" | "yes" => Some(BoolSignal::Value(true)),
                "0" | "false" | "inactive" | "disabled" | "deleted" | "no" => {
                    Some(BoolSignal::Value(false))
                }
                _ => Some(BoolSignal::Unrecognized(s.trim().to_string())),
            }
        }
        _ => None,
    }
}

/// Paginated list endpoints wrap their items in different envelopes; accept a
/// bare array or the first array found under a known wrapper key.
pub fn as_items(v: &Value) -> Option<&Vec<Value>> {
    if let Value::Array(items) = v {
        return Some(items);
    }
    for key in ["data", "results", "items", "rows", "users"] {
        if let Some(Value::Array(items)) = v.get(key) {
            return Some(items);
        }
    }
    None
}
