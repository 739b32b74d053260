//! Atomic last-known-event store, keyed by entity key.
//!
//! `get_and_update` is the single write path: it swaps the stored event for
//! a key and hands back whatever was there before, in one critical section,
//! so the handler can build `StateObject.previous` without a second lookup
//! racing a concurrent writer for the same key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::state::raw_event::RawEvent;

#[derive(Default)]
pub struct StateStore {
    inner: Mutex<HashMap<String, RawEvent>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically replace the stored event for `key` with `new_event`,
    /// returning whatever was stored immediately before.
    pub fn get_and_update(&self, key: &str, new_event: RawEvent) -> Option<RawEvent> {
        let mut guard = self.inner.lock().expect("state store mutex poisoned");
        guard.insert(key.to_string(), new_event)
    }

    pub fn get(&self, key: &str) -> Option<RawEvent> {
        let guard = self.inner.lock().expect("state store mutex poisoned");
        guard.get(key).cloned()
    }

    /// A consistent, immutable, point-in-time copy of the whole store.
    pub fn snapshot(&self) -> Arc<HashMap<String, RawEvent>> {
        let guard = self.inner.lock().expect("state store mutex poisoned");
        Arc::new(guard.clone())
    }
}
