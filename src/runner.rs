//! `ActionRunner` (§4.6): one trigger bound to an ordered executor list and
//! a per-entity cooldown ledger.

use std::collections::{HashMap, HashMap as Map};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::action::{Action, ActionContext, ActionExecutor};
use crate::state::object::StateObject;
use crate::trigger::{DurationTrigger, EdgeTrigger};
use crate::worker_pool::WorkerPool;

enum TriggerKind {
    Edge(EdgeTrigger),
    Duration(DurationTrigger),
}

pub struct ActionRunner {
    trigger: TriggerKind,
    executors: Vec<Action>,
    cooldown: Duration,
    last_fire: Mutex<Map<String, Instant>>,
    ctx: ActionContext,
    pool: Arc<WorkerPool>,
}

impl ActionRunner {
    pub fn new_edge(
        conditions: HashMap<String, String>,
        executors: Vec<Action>,
        cooldown: Duration,
        ctx: ActionContext,
        pool: Arc<WorkerPool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            trigger: TriggerKind::Edge(EdgeTrigger::new(conditions)),
            executors,
            cooldown,
            last_fire: Mutex::new(HashMap::new()),
            ctx,
            pool,
        })
    }

    pub fn new_duration(
        conditions: HashMap<String, String>,
        duration: Duration,
        executors: Vec<Action>,
        cooldown: Duration,
        ctx: ActionContext,
        pool: Arc<WorkerPool>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            let callback_runner = weak.clone();
            let trigger = DurationTrigger::new(
                conditions,
                duration,
                Arc::new(move |state: Arc<StateObject>| {
                    if let Some(runner) = callback_runner.upgrade() {
                        runner.fire(state);
                    }
                }),
            );
            Self {
                trigger: TriggerKind::Duration(trigger),
                executors,
                cooldown,
                last_fire: Mutex::new(HashMap::new()),
                ctx,
                pool,
            }
        })
    }

    /// Feed one event through the trigger. Edge triggers may fire
    /// synchronously within this call; duration triggers fire later, from
    /// their own timer thread, via the callback passed at construction.
    pub fn run(self: &Arc<Self>, state: Arc<StateObject>) {
        match &self.trigger {
            TriggerKind::Edge(edge) => {
                if edge.evaluate(&state) {
                    self.fire(state);
                }
            }
            TriggerKind::Duration(duration) => duration.evaluate(state),
        }
    }

    /// Cooldown-gate a firing state, then hand executors to the worker pool
    /// (§4.6, §5) so a slow shell/webhook/device-command call never blocks
    /// the thread that delivered the event.
    fn fire(&self, state: Arc<StateObject>) {
        let now = Instant::now();
        {
            let mut ledger = self.last_fire.lock().expect("cooldown ledger mutex poisoned");
            if let Some(last) = ledger.get(&state.id) {
                if now.duration_since(*last) < self.cooldown {
                    log::debug!("rule fire for '{}' dropped by cooldown", state.id);
                    return;
                }
            }
            ledger.insert(state.id.clone(), now);
        }
        let executors = self.executors.clone();
        let ctx = self.ctx.clone();
        self.pool.submit(Box::new(move || {
            for executor in &executors {
                if let Err(e) = executor.execute(&state, &ctx) {
                    log::warn!("action executor failed for entity '{}': {e}", state.id);
                }
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTable;
    use crate::state::object::AliasView;
    use crate::state::raw_event::SourceKind;
    use crate::value::Value;

    fn ctx() -> ActionContext {
        ActionContext {
            aliases: Arc::new(AliasTable::new(HashMap::new()).unwrap()),
            mqtt_publisher: None,
            device_controller: None,
        }
    }

    fn pool() -> Arc<WorkerPool> {
        WorkerPool::new(1)
    }

    fn state_with(id: &str, attrs: &[(&str, Value)]) -> Arc<StateObject> {
        let mut attributes = HashMap::new();
        for (k, v) in attrs {
            attributes.insert(k.to_string(), v.clone());
        }
        Arc::new(StateObject::new(
            SourceKind::Ble,
            id.to_string(),
            attributes,
            None,
            Arc::new(AliasView::default()),
        ))
    }

    #[test]
    fn edge_runner_cooldown_prevents_immediate_refire() {
        let runner = ActionRunner::new_edge(
            HashMap::from([("motion_detected".to_string(), "true".to_string())]),
            vec![],
            Duration::from_secs(60),
            ctx(),
            pool(),
        );
        let on = state_with("a", &[("motion_detected", Value::Bool(true))]);
        let off = state_with("a", &[("motion_detected", Value::Bool(false))]);
        runner.run(off);
        runner.run(on.clone());
        let ledger = runner.last_fire.lock().unwrap();
        let first = *ledger.get("a").unwrap();
        drop(ledger);
        runner.run(state_with("a", &[("motion_detected", Value::Bool(false))]));
        runner.run(on);
        let ledger = runner.last_fire.lock().unwrap();
        assert_eq!(*ledger.get("a").unwrap(), first);
    }

    #[test]
    fn duration_runner_fires_via_callback_after_timer_expires() {
        let runner = ActionRunner::new_duration(
            HashMap::from([("motion_detected".to_string(), "true".to_string())]),
            Duration::from_millis(30),
            vec![Action::Log(crate::action::LogAction {
                level: crate::action::log_action::LogLevel::Info,
                message: "fired".to_string(),
            })],
            Duration::from_secs(0),
            ctx(),
            pool(),
        );
        let on = state_with("a", &[("motion_detected", Value::Bool(true))]);
        runner.run(on);
        std::thread::sleep(Duration::from_millis(80));
        assert!(runner.last_fire.lock().unwrap().contains_key("a"));
    }
}
