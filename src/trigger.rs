//! Per-entity trigger state machines (§4.4). Both variants evaluate one
//! rule's conditions against each event and decide whether to emit `Fire`;
//! cooldown is the runner's concern, not the trigger's.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::condition;
use crate::state::object::StateObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Low,
    High,
}

/// Fires on the rising edge of the condition map (Low -> High).
#[derive(Default)]
pub struct EdgeTrigger {
    conditions: HashMap<String, String>,
    last_result: Mutex<HashMap<String, EdgeState>>,
}

impl EdgeTrigger {
    pub fn new(conditions: HashMap<String, String>) -> Self {
        Self {
            conditions,
            last_result: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate against `state`; returns true exactly on a rising edge.
    pub fn evaluate(&self, state: &StateObject) -> bool {
        let r = condition::evaluate(state, &self.conditions);
        let mut ledger = self.last_result.lock().expect("edge trigger mutex poisoned");
        let prior = *ledger.entry(state.id.clone()).or_insert(EdgeState::Low);
        let next = if r { EdgeState::High } else { EdgeState::Low };
        ledger.insert(state.id.clone(), next);
        prior == EdgeState::Low && next == EdgeState::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationState {
    Idle,
    Arming,
    Fired,
}

struct EntrySlot {
    state: DurationState,
    generation: u64,
}

/// Fires once the condition map has stayed true continuously for
/// `duration`. Since expiry happens on a timer thread, independent of any
/// incoming event, `Fire` is reported through a callback rather than as an
/// `evaluate()` return value; the callback receives the `StateObject` that
/// armed the timer. A cancelled timer is guaranteed to never fire because
/// each scheduled callback captures the generation it was armed under and
/// checks it against the current generation before invoking `on_fire`.
pub struct DurationTrigger {
    conditions: HashMap<String, String>,
    duration: Duration,
    entries: Arc<Mutex<HashMap<String, EntrySlot>>>,
    generation: Arc<AtomicU64>,
    on_fire: Arc<dyn Fn(Arc<StateObject>) + Send + Sync>,
}

impl DurationTrigger {
    pub fn new(
        conditions: HashMap<String, String>,
        duration: Duration,
        on_fire: Arc<dyn Fn(Arc<StateObject>) + Send + Sync>,
    ) -> Self {
        Self {
            conditions,
            duration,
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            on_fire,
        }
    }

    /// Evaluate against `state`, arming, cancelling, or re-arming the
    /// per-entity timer as needed (§4.4). Never fires synchronously.
    pub fn evaluate(&self, state: Arc<StateObject>) {
        let r = condition::evaluate(&state, &self.conditions);
        let mut entries = self.entries.lock().expect("duration trigger mutex poisoned");
        let slot = entries.entry(state.id.clone()).or_insert(EntrySlot {
            state: DurationState::Idle,
            generation: 0,
        });
        match (slot.state, r) {
            (DurationState::Idle, true) => {
                let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                slot.state = DurationState::Arming;
                slot.generation = gen;
                drop(entries);
                self.arm_timer(state, gen);
            }
            (DurationState::Arming, false) => {
                slot.generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                slot.state = DurationState::Idle;
            }
            (DurationState::Fired, false) => {
                slot.state = DurationState::Idle;
            }
            _ => {}
        }
    }

    fn arm_timer(&self, state: Arc<StateObject>, generation: u64) {
        let entries = Arc::clone(&self.entries);
        let duration = self.duration;
        let on_fire = Arc::clone(&self.on_fire);
        let entity = state.id.clone();
        thread::spawn(move || {
            thread::sleep(duration);
            let fired = {
                let mut entries = entries.lock().expect("duration trigger mutex poisoned");
                match entries.get_mut(&entity) {
                    Some(slot) if slot.generation == generation && slot.state == DurationState::Arming => {
                        slot.state = DurationState::Fired;
                        true
                    }
                    _ => false,
                }
            };
            if fired {
                on_fire(state);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::object::AliasView;
    use crate::state::raw_event::SourceKind;
    use crate::value::Value;
    use std::collections::HashMap as Map;

    fn state_with(id: &str, attrs: &[(&str, Value)]) -> StateObject {
        let mut attributes = Map::new();
        for (k, v) in attrs {
            attributes.insert(k.to_string(), v.clone());
        }
        StateObject::new(
            SourceKind::Ble,
            id.to_string(),
            attributes,
            None,
            Arc::new(AliasView::default()),
        )
    }

    #[test]
    fn edge_trigger_fires_only_on_rising_edge() {
        let t = EdgeTrigger::new(HashMap::from([(
            "motion_detected".to_string(),
            "true".to_string(),
        )]));
        let off = state_with("a", &[("motion_detected", Value::Bool(false))]);
        let on = state_with("a", &[("motion_detected", Value::Bool(true))]);
        assert!(!t.evaluate(&off));
        assert!(t.evaluate(&on));
        assert!(!t.evaluate(&on));
        assert!(!t.evaluate(&off));
        assert!(t.evaluate(&on));
    }

    #[test]
    fn edge_trigger_with_empty_conditions_fires_once_per_new_entity() {
        let t = EdgeTrigger::new(HashMap::new());
        let a = state_with("a", &[]);
        let b = state_with("b", &[]);
        assert!(t.evaluate(&a));
        assert!(!t.evaluate(&a));
        assert!(t.evaluate(&b));
    }

    #[test]
    fn duration_trigger_fires_after_sustained_true() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let fired_clone = Arc::clone(&fired);
        let t = DurationTrigger::new(
            HashMap::from([("motion_detected".to_string(), "true".to_string())]),
            Duration::from_millis(30),
            Arc::new(move |s: Arc<StateObject>| fired_clone.lock().unwrap().push(s.id.clone())),
        );
        let on = Arc::new(state_with("a", &[("motion_detected", Value::Bool(true))]));
        t.evaluate(on);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(*fired.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn duration_trigger_cancelled_before_expiry_never_fires() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let fired_clone = Arc::clone(&fired);
        let t = DurationTrigger::new(
            HashMap::from([("motion_detected".to_string(), "true".to_string())]),
            Duration::from_millis(30),
            Arc::new(move |s: Arc<StateObject>| fired_clone.lock().unwrap().push(s.id.clone())),
        );
        let on = Arc::new(state_with("a", &[("motion_detected", Value::Bool(true))]));
        let off = Arc::new(state_with("a", &[("motion_detected", Value::Bool(false))]));
        t.evaluate(on);
        thread::sleep(Duration::from_millis(5));
        t.evaluate(off);
        thread::sleep(Duration::from_millis(80));
        assert!(fired.lock().unwrap().is_empty());
    }
}
