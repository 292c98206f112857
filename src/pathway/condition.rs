//! The branch condition DSL.
//!
//! A pure function over a worker's signal map. Deterministic by
//! construction: no I/O, no clocks, no randomness.

use serde_json::Value;

use super::types::{Condition, Operator};

/// Evaluate one condition against a signal map.
///
/// Signals must be a JSON object; anything else evaluates false, as does an
/// unknown operator. Missing fields behave per operator: `notEquals` and
/// `notExists` are satisfied by absence, everything else is not.
pub fn evaluate(condition: &Condition, signals: &Value) -> bool {
    let map = match signals.as_object() {
        Some(map) => map,
        None => return false,
    };
    let field_value = map.get(&condition.field);

    match condition.operator {
        Operator::Equals => match (field_value, &condition.value) {
            (Some(actual), Some(expected)) => actual == expected,
            _ => false,
        },
        Operator::NotEquals => match (field_value, &condition.value) {
            (Some(actual), Some(expected)) => actual != expected,
            (None, Some(_)) => true,
            _ => false,
        },
        Operator::Contains => {
            let haystack = field_value.map(coerce_string).unwrap_or_default();
            let needle = condition
                .value
                .as_ref()
                .map(coerce_string)
                .unwrap_or_default();
            !needle.is_empty() && haystack.contains(&needle)
        }
        Operator::GreaterThan => match (
            field_value.and_then(coerce_number),
            condition.value.as_ref().and_then(coerce_number),
        ) {
            (Some(actual), Some(expected)) => actual > expected,
            _ => false,
        },
        Operator::LessThan => match (
            field_value.and_then(coerce_number),
            condition.value.as_ref().and_then(coerce_number),
        ) {
            (Some(actual), Some(expected)) => actual < expected,
            _ => false,
        },
        Operator::In => match (field_value, &condition.value) {
            (Some(actual), Some(Value::Array(list))) => list.contains(actual),
            _ => false,
        },
        Operator::Exists => matches!(field_value, Some(v) if !v.is_null()),
        Operator::NotExists => !matches!(field_value, Some(v) if !v.is_null()),
        Operator::Unknown => false,
    }
}

/// Stringify a signal value for containment checks. Null becomes empty.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric coercion: numbers pass through, numeric strings parse, booleans
/// and everything else fail.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
