//! Server-side evaluation of filter trees and search relevance.
//!
//! Works on raw JSON so the mock stays independent of the client's types.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Evaluate a rule group against a record's data.
pub fn matches_group(group: &Value, data: &Map<String, Value>) -> Result<bool, String> {
    let condition = match group.get("condition").and_then(Value::as_str) {
        Some(c @ ("AND" | "OR")) => c,
        _ => return Err("filter condition must be AND or OR".to_string()),
    };
    let rules = match group.get("rules").and_then(Value::as_array) {
        Some(rules) if !rules.is_empty() => rules,
        _ => return Err("filter rules must be a non-empty array".to_string()),
    };

    for rule in rules {
        let hit = matches_node(rule, data)?;
        match (condition, hit) {
            ("AND", false) => return Ok(false),
            ("OR", true) => return Ok(true),
            _ => {}
        }
    }
    Ok(condition == "AND")
}

fn matches_node(node: &Value, data: &Map<String, Value>) -> Result<bool, String> {
    if node.get("rules").is_some() || node.get("condition").is_some() {
        matches_group(node, data)
    } else {
        matches_column(node, data)
    }
}

fn matches_column(rule: &Value, data: &Map<String, Value>) -> Result<bool, String> {
    let column = rule
        .get("column")
        .and_then(Value::as_str)
        .ok_or("filter rule requires a column")?;
    let operator = rule
        .get("operator")
        .and_then(Value::as_str)
        .ok_or("filter rule requires an operator")?;
    let field = lookup(data, column);

    if let Some(empty) = match operator {
        "is_empty" => Some(true),
        "is_not_empty" => Some(false),
        _ => None,
    } {
        return Ok(field.map_or(true, is_blank) == empty);
    }

    let value = rule
        .get("value")
        .filter(|v| !v.is_null())
        .ok_or_else(|| format!("operator {operator} requires a value"))?;

    let ordered = |want: &[Ordering]| field.and_then(|f| compare(f, value)).is_some_and(|o| want.contains(&o));

    Ok(match operator {
        "equals" => field.is_some_and(|f| loosely_equal(f, value)),
        "not_equals" => !field.is_some_and(|f| loosely_equal(f, value)),
        "greater_than" => ordered(&[Ordering::Greater]),
        "less_than" => ordered(&[Ordering::Less]),
        "greater_than_or_equals" => ordered(&[Ordering::Greater, Ordering::Equal]),
        "less_than_or_equals" => ordered(&[Ordering::Less, Ordering::Equal]),
        "contains" => field.is_some_and(|f| contains(f, value)),
        "not_contains" => !field.is_some_and(|f| contains(f, value)),
        "starts_with" => text_pair(field, value).is_some_and(|(f, v)| f.starts_with(&v)),
        "ends_with" => text_pair(field, value).is_some_and(|(f, v)| f.ends_with(&v)),
        other => return Err(format!("Unknown operator: {other}")),
    })
}

/// Dotted paths descend into nested objects.
fn lookup<'a>(data: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    let mut parts = column.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn loosely_equal(field: &Value, value: &Value) -> bool {
    match (field.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => field == value,
    }
}

fn compare(field: &Value, value: &Value) -> Option<Ordering> {
    match (field, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(field: &Value, value: &Value) -> bool {
    match (field, value) {
        (Value::String(f), Value::String(v)) => f.to_lowercase().contains(&v.to_lowercase()),
        (Value::Array(items), v) => items.iter().any(|item| loosely_equal(item, v)),
        _ => false,
    }
}

fn text_pair(field: Option<&Value>, value: &Value) -> Option<(String, String)> {
    Some((
        field?.as_str()?.to_lowercase(),
        value.as_str()?.to_lowercase(),
    ))
}

/// Fraction of query tokens found in the record's text values.
pub fn relevance(query: &str, data: &Map<String, Value>) -> f64 {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let mut haystack = String::new();
    collect_text(&Value::Object(data.clone()), &mut haystack);
    let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(&s.to_lowercase());
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}
