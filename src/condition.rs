//! Flat `key -> "operator value"` condition evaluation (§4.1).

use std::collections::HashMap;

use crate::placeholder;
use crate::state::object::StateObject;
use crate::value::Value;

const OPERATORS: &[&str] = &["==", "!=", ">=", "<=", ">", "<"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Op {
    fn parse(token: &str) -> Op {
        match token {
            "!=" => Op::Ne,
            ">=" => Op::Ge,
            "<=" => Op::Le,
            ">" => Op::Gt,
            "<" => Op::Lt,
            _ => Op::Eq,
        }
    }
}

/// Split a raw RHS string into its operator and literal value text, per
/// the longest-match rule; default operator is `==` when none is present.
fn parse_rhs(raw: &str) -> (Op, &str) {
    let trimmed = raw.trim_start();
    for op in OPERATORS {
        if let Some(rest) = trimmed.strip_prefix(op) {
            return (Op::parse(op), rest.trim());
        }
    }
    (Op::Eq, trimmed.trim())
}

/// Resolve `key` against `state`'s three scopes. Returns `None` when the
/// scope, alias, or attribute is missing (condition is then false).
fn resolve_key<'a>(state: &'a StateObject, key: &str) -> Option<&'a Value> {
    if let Some(attr) = key.strip_prefix("previous.") {
        return state.previous_attribute(attr);
    }
    match key.split_once('.') {
        None => state.attribute(key),
        Some((alias, attr)) => {
            if !state.snapshot.contains_alias(alias) {
                log::warn!("condition references unknown device alias '{alias}'");
                return None;
            }
            state.snapshot.attribute(alias, attr)
        }
    }
}

fn compare(left: &Value, op: Op, rhs_text: &str) -> bool {
    match left {
        Value::Bool(b) => {
            if !matches!(op, Op::Eq | Op::Ne) {
                return false;
            }
            let Some(r) = parse_bool(rhs_text) else {
                return false;
            };
            match op {
                Op::Eq => *b == r,
                Op::Ne => *b != r,
                _ => unreachable!(),
            }
        }
        Value::Int(_) | Value::Float(_) => {
            let l = match left {
                Value::Int(i) => *i as f64,
                Value::Float(f) => *f,
                _ => unreachable!(),
            };
            let Ok(r) = rhs_text.parse::<f64>() else {
                return false;
            };
            match op {
                Op::Eq => l == r,
                Op::Ne => l != r,
                Op::Ge => l >= r,
                Op::Le => l <= r,
                Op::Gt => l > r,
                Op::Lt => l < r,
            }
        }
        Value::Str(s) => match op {
            Op::Eq => s.as_str() == rhs_text,
            Op::Ne => s.as_str() != rhs_text,
            Op::Ge => s.as_str() >= rhs_text,
            Op::Le => s.as_str() <= rhs_text,
            Op::Gt => s.as_str() > rhs_text,
            Op::Lt => s.as_str() < rhs_text,
        },
        Value::Null => false,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Evaluate every entry of a condition map against `state`. An empty map
/// evaluates to true (§4.1 "first-seen per entity" rule).
pub fn evaluate(state: &StateObject, conditions: &HashMap<String, String>) -> bool {
    conditions
        .iter()
        .all(|(key, raw_rhs)| evaluate_one(state, key, raw_rhs))
}

fn evaluate_one(state: &StateObject, key: &str, raw_rhs: &str) -> bool {
    let Some(left) = resolve_key(state, key) else {
        return false;
    };
    let (op, rhs_with_placeholders) = parse_rhs(raw_rhs);
    let rhs_text = placeholder::format(state, rhs_with_placeholders);
    compare(left, op, &rhs_text)
}
