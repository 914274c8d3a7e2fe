//! Per-thread slots holding the current context.

use std::cell::{Cell, RefCell};

use super::scope::Scope;
use crate::propagation::TraceContext;

thread_local! {
    static DEFAULT_SLOT: RefCell<Option<TraceContext>> = const { RefCell::new(None) };
    static INHERITABLE_SLOT: RefCell<Option<TraceContext>> = const { RefCell::new(None) };
}

/// Which per-thread slot a scope manager reads and writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ContextStorage {
    /// Visible only to the thread that set it.
    #[default]
    ThreadLocal,
    /// Also seeded into threads spawned through the scope manager.
    Inheritable,
}

impl ContextStorage {
    fn with_slot<R>(self, f: impl FnOnce(&RefCell<Option<TraceContext>>) -> R) -> Option<R> {
        let slot = match self {
            ContextStorage::ThreadLocal => &DEFAULT_SLOT,
            ContextStorage::Inheritable => &INHERITABLE_SLOT,
        };
        // The slot is gone while the thread is tearing down.
        slot.try_with(f).ok()
    }

    pub(crate) fn get(self) -> Option<TraceContext> {
        self.with_slot(|slot| slot.borrow().clone()).flatten()
    }

    /// Installs `context`, returning what was there.
    pub(crate) fn replace(self, context: Option<TraceContext>) -> Option<TraceContext> {
        self.with_slot(|slot| slot.replace(context)).flatten()
    }
}

/// Restores the previous slot value on close.
pub(crate) struct ThreadLocalScope {
    storage: ContextStorage,
    previous: RefCell<Option<TraceContext>>,
    closed: Cell<bool>,
}

impl ThreadLocalScope {
    pub(crate) fn new(storage: ContextStorage, previous: Option<TraceContext>) -> Self {
        Self {
            storage,
            previous: RefCell::new(previous),
            closed: Cell::new(false),
        }
    }
}

impl Scope for ThreadLocalScope {
    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let previous = self.previous.borrow_mut().take();
        self.storage.replace(previous);
    }
}
