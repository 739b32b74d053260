//! `AutomationHandler` (§4.7): routes each raw event through the store,
//! builds the immutable `StateObject`, and dispatches to matching runners.

use std::collections::HashMap;
use std::sync::Arc;

use crate::alias::AliasTable;
use crate::rule::topic_matches;
use crate::runner::ActionRunner;
use crate::state::object::{AliasView, StateObject};
use crate::state::raw_event::{RawEvent, SourceKind};
use crate::state::store::StateStore;

pub struct RunnerEntry {
    pub source: SourceKind,
    pub topic_pattern: Option<String>,
    pub runner: Arc<ActionRunner>,
}

pub struct AutomationHandler {
    store: Arc<StateStore>,
    aliases: Arc<AliasTable>,
    runners: Vec<RunnerEntry>,
}

impl AutomationHandler {
    pub fn new(aliases: Arc<AliasTable>, runners: Vec<RunnerEntry>) -> Self {
        Self::with_store(Arc::new(StateStore::new()), aliases, runners)
    }

    /// Build a handler sharing a caller-owned store, so a metrics endpoint
    /// can scrape the same state the handler is writing (§6 sink contract).
    pub fn with_store(store: Arc<StateStore>, aliases: Arc<AliasTable>, runners: Vec<RunnerEntry>) -> Self {
        Self {
            store,
            aliases,
            runners,
        }
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    /// Process one raw event delivered by a source (§4.7 steps 1-4).
    pub fn handle(&self, raw: RawEvent) {
        let key = raw.key.clone();
        let kind = raw.kind;
        let prev = self.store.get_and_update(&key, raw.clone());
        let snap = self.store.snapshot();

        let mut by_alias = HashMap::new();
        for (alias_name, device) in self.aliases.iter() {
            if let Some(ev) = snap.get(&device.address) {
                by_alias.insert(alias_name.clone(), ev.clone());
            }
        }

        let previous = prev.map(|p| {
            Arc::new(StateObject::new(
                p.kind,
                p.key,
                p.attributes,
                None,
                Arc::new(AliasView::default()),
            ))
        });

        let state = Arc::new(StateObject::new(
            kind,
            key.clone(),
            raw.attributes,
            previous,
            Arc::new(AliasView::new(by_alias)),
        ));

        for entry in &self.runners {
            if entry.source != kind {
                continue;
            }
            if let Some(pattern) = &entry.topic_pattern {
                if !topic_matches(pattern, &key) {
                    continue;
                }
            }
            entry.runner.run(Arc::clone(&state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionContext, LogAction};
    use crate::action::log_action::LogLevel;
    use crate::value::Value;
    use std::time::Duration;

    fn ctx() -> ActionContext {
        ActionContext {
            aliases: Arc::new(AliasTable::new(HashMap::new()).unwrap()),
            mqtt_publisher: None,
            device_controller: None,
        }
    }

    fn pool() -> Arc<crate::worker_pool::WorkerPool> {
        crate::worker_pool::WorkerPool::new(1)
    }

    fn raw_ble(key: &str, attrs: &[(&str, Value)]) -> RawEvent {
        let mut attributes = HashMap::new();
        for (k, v) in attrs {
            attributes.insert(k.to_string(), v.clone());
        }
        RawEvent {
            kind: SourceKind::Ble,
            key: key.to_string(),
            attributes,
        }
    }

    #[test]
    fn dispatches_only_to_runners_matching_source_kind() {
        let runner = ActionRunner::new_edge(HashMap::new(), vec![], Duration::default(), ctx(), pool());
        let aliases = Arc::new(AliasTable::new(HashMap::new()).unwrap());
        let handler = AutomationHandler::new(
            Arc::clone(&aliases),
            vec![RunnerEntry {
                source: SourceKind::Mqtt,
                topic_pattern: Some("home/#".to_string()),
                runner,
            }],
        );
        handler.handle(raw_ble("aa:bb", &[]));
    }

    #[test]
    fn mqtt_runner_matches_wildcard_topic_pattern() {
        let runner = ActionRunner::new_edge(
            HashMap::new(),
            vec![Action::Log(LogAction {
                level: LogLevel::Info,
                message: "fired".to_string(),
            })],
            Duration::default(),
            ctx(),
            pool(),
        );
        let aliases = Arc::new(AliasTable::new(HashMap::new()).unwrap());
        let handler = AutomationHandler::new(
            aliases,
            vec![RunnerEntry {
                source: SourceKind::Mqtt,
                topic_pattern: Some("home/+/temperature".to_string()),
                runner,
            }],
        );
        handler.handle(RawEvent {
            kind: SourceKind::Mqtt,
            key: "home/kitchen/temperature".to_string(),
            attributes: HashMap::new(),
        });
    }

    #[test]
    fn snapshot_includes_the_just_written_event() {
        let mut devices = HashMap::new();
        devices.insert(
            "self".to_string(),
            crate::alias::DeviceConfig {
                address: "aa:bb".to_string(),
                device_type: None,
                params: HashMap::new(),
            },
        );
        let aliases = Arc::new(AliasTable::new(devices).unwrap());
        let handler = AutomationHandler::new(aliases, vec![]);
        handler.handle(raw_ble("aa:bb", &[("battery", Value::Int(90))]));
        let snap = handler.store.snapshot();
        assert_eq!(
            snap.get("aa:bb").unwrap().attributes.get("battery"),
            Some(&Value::Int(90))
        );
    }
}
