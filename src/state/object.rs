//! `StateObject`: the immutable bundle of {triggering event, previous
//! event, snapshot of other entities} handed to runners. Constructed only
//! by the `AutomationHandler`; nothing downstream gets a `&mut` path back
//! into it, which is how "once handed to a runner it must not be mutated"
//! is enforced by construction rather than convention.

use std::collections::HashMap;
use std::sync::Arc;

use crate::state::raw_event::{RawEvent, SourceKind};
use crate::value::Value;

/// A read-only, alias-indexed view over every other known entity at
/// dispatch time. Only reachable through a configured alias, never by raw
/// entity key, per the condition language's `alias.attribute` scoping.
#[derive(Default)]
pub struct AliasView {
    by_alias: HashMap<String, RawEvent>,
}

impl AliasView {
    pub fn new(by_alias: HashMap<String, RawEvent>) -> Self {
        Self { by_alias }
    }

    pub fn attribute(&self, alias: &str, attr: &str) -> Option<&Value> {
        self.by_alias.get(alias)?.attributes.get(attr)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.by_alias.contains_key(alias)
    }

    /// The entity key (address/topic) bound to `alias`, used by the
    /// placeholder formatter's bare-name-resolves-to-alias-id rule.
    pub fn entity_key(&self, alias: &str) -> Option<&str> {
        self.by_alias.get(alias).map(|raw| raw.key.as_str())
    }
}

pub struct StateObject {
    pub kind: SourceKind,
    pub id: String,
    pub attributes: HashMap<String, Value>,
    pub previous: Option<Arc<StateObject>>,
    pub snapshot: Arc<AliasView>,
}

impl StateObject {
    pub fn new(
        kind: SourceKind,
        id: String,
        attributes: HashMap<String, Value>,
        previous: Option<Arc<StateObject>>,
        snapshot: Arc<AliasView>,
    ) -> Self {
        Self {
            kind,
            id,
            attributes,
            previous,
            snapshot,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn previous_attribute(&self, name: &str) -> Option<&Value> {
        self.previous.as_ref()?.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(attrs: &[(&str, Value)]) -> StateObject {
        let mut attributes = HashMap::new();
        for (k, v) in attrs {
            attributes.insert(k.to_string(), v.clone());
        }
        StateObject::new(
            SourceKind::Ble,
            "aa:bb".to_string(),
            attributes,
            None,
            Arc::new(AliasView::default()),
        )
    }

    #[test]
    fn previous_attribute_is_none_without_a_previous_state() {
        let s = state_with(&[]);
        assert!(s.previous_attribute("button_count").is_none());
    }

    #[test]
    fn previous_attribute_reads_through_to_previous_state() {
        let prev = state_with(&[("button_count", Value::Int(5))]);
        let mut cur = state_with(&[("button_count", Value::Int(6))]);
        cur.previous = Some(Arc::new(prev));
        assert_eq!(cur.previous_attribute("button_count"), Some(&Value::Int(5)));
        assert_eq!(cur.attribute("button_count"), Some(&Value::Int(6)));
    }

    #[test]
    fn alias_view_resolves_attribute_and_entity_key() {
        let mut by_alias = HashMap::new();
        by_alias.insert(
            "window".to_string(),
            RawEvent {
                kind: SourceKind::Ble,
                key: "11:22:33".to_string(),
                attributes: HashMap::from([(
                    "contact_open".to_string(),
                    Value::Bool(false),
                )]),
            },
        );
        let view = AliasView::new(by_alias);
        assert_eq!(view.attribute("window", "contact_open"), Some(&Value::Bool(false)));
        assert_eq!(view.entity_key("window"), Some("11:22:33"));
        assert!(view.attribute("unknown", "x").is_none());
    }
}
