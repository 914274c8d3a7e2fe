//! Built-in correlation stores.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::CorrelationContext;

thread_local! {
    static THREAD_CONTEXT: RefCell<BTreeMap<String, String>> = RefCell::new(BTreeMap::new());
}

/// Per-thread key/value map, the analogue of a logging framework's thread context.
///
/// All instances share the calling thread's map.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLocalCorrelationContext;

impl ThreadLocalCorrelationContext {
    /// Copy of this thread's entries, ordered by key.
    pub fn snapshot() -> BTreeMap<String, String> {
        THREAD_CONTEXT
            .try_with(|map| map.borrow().clone())
            .unwrap_or_default()
    }

    /// Removes every entry for this thread.
    pub fn clear() {
        let _ = THREAD_CONTEXT.try_with(|map| map.borrow_mut().clear());
    }
}

impl CorrelationContext for ThreadLocalCorrelationContext {
    fn get_value(&self, name: &str) -> Option<String> {
        THREAD_CONTEXT
            .try_with(|map| map.borrow().get(name).cloned())
            .ok()
            .flatten()
    }

    fn update(&self, name: &str, value: Option<&str>) -> bool {
        THREAD_CONTEXT
            .try_with(|map| {
                let mut map = map.borrow_mut();
                match value {
                    Some(value) if map.get(name).map(String::as_str) == Some(value) => false,
                    Some(value) => {
                        map.insert(name.to_string(), value.to_string());
                        true
                    }
                    None => map.remove(name).is_some(),
                }
            })
            .unwrap_or(false)
    }
}

/// Shared map store for single-worker hosts and tests.
#[derive(Debug, Default)]
pub struct MapCorrelationContext {
    values: Mutex<HashMap<String, String>>,
}

impl MapCorrelationContext {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the entries, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.lock().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl CorrelationContext for MapCorrelationContext {
    fn get_value(&self, name: &str) -> Option<String> {
        self.values.lock().get(name).cloned()
    }

    fn update(&self, name: &str, value: Option<&str>) -> bool {
        let mut values = self.values.lock();
        match value {
            Some(value) if values.get(name).map(String::as_str) == Some(value) => false,
            Some(value) => {
                values.insert(name.to_string(), value.to_string());
                true
            }
            None => values.remove(name).is_some(),
        }
    }
}
