//! `{path}` substitution used by both the condition evaluator's RHS and
//! action executors' configuration strings.

use crate::state::object::StateObject;
use crate::value::Value;

/// Resolve a single `path` (no surrounding braces) against `state`,
/// following the precedence order from §4.2: `previous.attr` first,
/// then a bare name against the triggering attributes, then a configured
/// alias (`alias` alone -> its id, `alias.attr` -> its attribute).
pub fn resolve(state: &StateObject, path: &str) -> Option<Value> {
    if let Some(attr) = path.strip_prefix("previous.") {
        return state.previous_attribute(attr).cloned();
    }
    match path.split_once('.') {
        None => {
            if let Some(v) = state.attribute(path) {
                return Some(v.clone());
            }
            if state.snapshot.contains_alias(path) {
                return state
                    .snapshot
                    .entity_key(path)
                    .map(|k| Value::Str(k.to_string()));
            }
            None
        }
        Some((alias, attr)) => state.snapshot.attribute(alias, attr).cloned(),
    }
}

/// Substitute every `{path}` token in `text`. Unresolvable placeholders
/// become the empty string, with a warning logged once per occurrence.
pub fn format(state: &StateObject, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = text[i..].find('}') {
                let path = &text[i + 1..i + end];
                match resolve(state, path) {
                    Some(v) => out.push_str(&v.render()),
                    None => {
                        log::warn!("unresolvable placeholder '{{{path}}}' in action config");
                    }
                }
                i += end + 1;
                continue;
            }
        }
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Recurse into a JSON-like payload: substitute string leaves, walk into
/// objects' values (not keys) and arrays. Non-string scalars pass through
/// untouched.
pub fn format_json(state: &StateObject, value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(format(state, s)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| format_json(state, v)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), format_json(state, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::object::AliasView;
    use crate::state::raw_event::{RawEvent, SourceKind};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn state() -> StateObject {
        let mut attrs = HashMap::new();
        attrs.insert("temperature".to_string(), Value::Float(21.5));
        let mut prev_attrs = HashMap::new();
        prev_attrs.insert("temperature".to_string(), Value::Float(20.0));
        let previous = StateObject::new(
            SourceKind::Ble,
            "aa:bb".to_string(),
            prev_attrs,
            None,
            Arc::new(AliasView::default()),
        );
        let mut by_alias = HashMap::new();
        by_alias.insert(
            "porch".to_string(),
            RawEvent {
                kind: SourceKind::Ble,
                key: "11:22:33".to_string(),
                attributes: HashMap::from([("battery".to_string(), Value::Int(80))]),
            },
        );
        StateObject::new(
            SourceKind::Ble,
            "aa:bb".to_string(),
            attrs,
            Some(Arc::new(previous)),
            Arc::new(AliasView::new(by_alias)),
        )
    }

    #[test]
    fn resolves_bare_triggering_attribute() {
        assert_eq!(format(&state(), "now: {temperature}"), "now: 21.5");
    }

    #[test]
    fn resolves_previous_prefixed_attribute() {
        assert_eq!(format(&state(), "was: {previous.temperature}"), "was: 20");
    }

    #[test]
    fn resolves_alias_attribute() {
        assert_eq!(format(&state(), "{porch.battery}"), "80");
    }

    #[test]
    fn bare_alias_name_resolves_to_its_entity_id() {
        assert_eq!(format(&state(), "{porch}"), "11:22:33");
    }

    #[test]
    fn unresolvable_placeholder_becomes_empty_string() {
        assert_eq!(format(&state(), "x{missing}y"), "xy");
    }

    #[test]
    fn triggering_attribute_wins_over_same_named_alias() {
        let mut attrs = HashMap::new();
        attrs.insert("porch".to_string(), Value::Str("shadowed".to_string()));
        let mut by_alias = HashMap::new();
        by_alias.insert(
            "porch".to_string(),
            RawEvent {
                kind: SourceKind::Ble,
                key: "11:22:33".to_string(),
                attributes: HashMap::new(),
            },
        );
        let s = StateObject::new(
            SourceKind::Ble,
            "aa:bb".to_string(),
            attrs,
            None,
            Arc::new(AliasView::new(by_alias)),
        );
        assert_eq!(format(&s, "{porch}"), "shadowed");
    }
}
