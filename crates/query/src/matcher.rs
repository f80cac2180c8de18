//! Condition evaluation against stored records.

use std::cmp::Ordering;

use serde_json::Value;

use crate::parse::{Condition, Operator};

/// True when the record satisfies every condition. Evaluation
/// short-circuits on the first failing condition.
pub fn matches(record: &Value, conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .all(|condition| condition.negate != satisfies(record, condition))
}

fn satisfies(record: &Value, condition: &Condition) -> bool {
    match &condition.field {
        Some(path) => {
            let field = lookup(record, path);
            match &condition.op {
                Operator::Exists => field.is_some_and(|v| !v.is_null()),
                Operator::Eq(literal) => field.is_some_and(|v| equals(v, literal)),
                Operator::OneOf(alternatives) => {
                    field.is_some_and(|v| alternatives.iter().any(|a| equals(v, a)))
                }
                Operator::Gt(l) => ordering(field, l).is_some_and(|o| o == Ordering::Greater),
                Operator::Gte(l) => ordering(field, l).is_some_and(|o| o != Ordering::Less),
                Operator::Lt(l) => ordering(field, l).is_some_and(|o| o == Ordering::Less),
                Operator::Lte(l) => ordering(field, l).is_some_and(|o| o != Ordering::Greater),
                Operator::Contains(l) => text_of(field).is_some_and(|t| fold(&t).contains(&fold(l))),
                Operator::StartsWith(l) => {
                    text_of(field).is_some_and(|t| fold(&t).starts_with(&fold(l)))
                }
                Operator::EndsWith(l) => {
                    text_of(field).is_some_and(|t| fold(&t).ends_with(&fold(l)))
                }
            }
        }
        // Bare term: full-text over the record's scalar leaves.
        None => {
            let leaves = scalar_leaves(record);
            match &condition.op {
                Operator::Eq(term) => leaves.iter().any(|leaf| leaf == term),
                Operator::Contains(term) => {
                    leaves.iter().any(|leaf| fold(leaf).contains(&fold(term)))
                }
                Operator::StartsWith(term) => {
                    leaves.iter().any(|leaf| fold(leaf).starts_with(&fold(term)))
                }
                Operator::EndsWith(term) => {
                    leaves.iter().any(|leaf| fold(leaf).ends_with(&fold(term)))
                }
                // Remaining operators require a field and cannot be
                // produced by the parser for bare terms.
                _ => false,
            }
        }
    }
}

/// Dot-path lookup into nested objects.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Exact equality: numeric when the field is a number, case-sensitive
/// text otherwise.
fn equals(field: &Value, literal: &str) -> bool {
    match field {
        Value::Number(n) => literal
            .parse::<f64>()
            .ok()
            .zip(n.as_f64())
            .is_some_and(|(l, f)| l == f),
        Value::Bool(b) => literal == if *b { "true" } else { "false" },
        Value::String(s) => s == literal,
        _ => false,
    }
}

/// Comparator ordering: numeric when both sides parse as numbers,
/// lexicographic otherwise.
fn ordering(field: Option<&Value>, literal: &str) -> Option<Ordering> {
    let field = field?;
    if let Some(n) = field.as_f64() {
        if let Ok(l) = literal.parse::<f64>() {
            return n.partial_cmp(&l);
        }
    }
    text_of(Some(field)).map(|t| t.as_str().cmp(literal))
}

fn text_of(field: Option<&Value>) -> Option<String> {
    match field? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn fold(s: &str) -> String {
    s.to_lowercase()
}

/// Every scalar value in the record, stringified, nested fields included.
fn scalar_leaves(record: &Value) -> Vec<String> {
    let mut leaves = Vec::new();
    collect_leaves(record, &mut leaves);
    leaves
}

fn collect_leaves(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_leaves(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_leaves(v, out)),
        Value::Null => {}
    }
}
