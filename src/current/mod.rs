//! Scope manager: makes one [`TraceContext`] current for a unit of work.
//!
//! There is no global instance. Hosts build a [`CurrentTraceContext`] (or an
//! [`Application`](crate::Application)) and pass it to whatever needs to read
//! or scope the current context. Storage is a per-thread slot, so scopes are
//! cheap and never block.
//!
//! Scope decorators run in configuration order each time a scope opens and
//! may wrap the returned scope, which is how correlation fields are
//! synchronized with a logging context.

mod scope;
mod storage;
mod wrap;

use std::fmt;
use std::sync::Arc;

pub use scope::{CurrentScope, NoopScope, NoopScopeDecorator, Scope, ScopeDecorator};
pub use storage::ContextStorage;
pub use wrap::Wrapped;

use crate::propagation::TraceContext;
use storage::ThreadLocalScope;

/// Makes a context current and runs scope decorators over each transition.
#[derive(Clone)]
pub struct CurrentTraceContext {
    storage: ContextStorage,
    decorators: Arc<[Arc<dyn ScopeDecorator>]>,
}

impl CurrentTraceContext {
    /// Starts a builder with thread-local storage and no decorators.
    pub fn builder() -> CurrentTraceContextBuilder {
        CurrentTraceContextBuilder::default()
    }

    /// Per-thread storage without decorators.
    pub fn thread_local() -> Self {
        Self::builder().build()
    }

    /// Storage that threads spawned via [`spawn`](Self::spawn) inherit.
    ///
    /// The child keeps the parent's context for its whole lifetime. Pooled or
    /// reused workers can therefore observe a stale context; prefer
    /// [`thread_local`](Self::thread_local) with explicit wrapping unless every
    /// spawned thread is short-lived.
    pub fn inheritable() -> Self {
        Self::builder().storage(ContextStorage::Inheritable).build()
    }

    /// Storage backing this manager.
    pub fn storage(&self) -> ContextStorage {
        self.storage
    }

    /// The context in scope on this thread, if any.
    pub fn get(&self) -> Option<TraceContext> {
        self.storage.get()
    }

    /// Makes `context` current (or clears it for `None`) until the scope closes.
    pub fn new_scope(&self, context: Option<&TraceContext>) -> CurrentScope {
        let previous = self.storage.replace(context.cloned());
        tracing::trace!(
            context = ?context.map(ToString::to_string),
            previous = ?previous.as_ref().map(ToString::to_string),
            "opening scope"
        );
        let scope: Box<dyn Scope> = Box::new(ThreadLocalScope::new(self.storage, previous));
        CurrentScope::new(self.decorate_scope(context, scope))
    }

    /// Like [`new_scope`](Self::new_scope), but skips the swap when `context`
    /// is already current.
    ///
    /// Decorators still run, over a [`NoopScope`]. Equality is identity
    /// equality, so a context differing only in extra is treated as current
    /// and its extra is not installed.
    pub fn maybe_scope(&self, context: Option<&TraceContext>) -> CurrentScope {
        let current = self.get();
        if current.as_ref() == context {
            return CurrentScope::new(self.decorate_scope(context, Box::new(NoopScope)));
        }
        self.new_scope(context)
    }

    fn decorate_scope(&self, context: Option<&TraceContext>, scope: Box<dyn Scope>) -> Box<dyn Scope> {
        self.decorators
            .iter()
            .fold(scope, |scope, decorator| decorator.decorate_scope(context, scope))
    }
}

impl Default for CurrentTraceContext {
    fn default() -> Self {
        Self::thread_local()
    }
}

impl fmt::Debug for CurrentTraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentTraceContext")
            .field("storage", &self.storage)
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

/// Builder for [`CurrentTraceContext`].
#[derive(Default)]
pub struct CurrentTraceContextBuilder {
    storage: ContextStorage,
    decorators: Vec<Arc<dyn ScopeDecorator>>,
}

impl CurrentTraceContextBuilder {
    /// Selects the storage strategy.
    pub fn storage(mut self, storage: ContextStorage) -> Self {
        self.storage = storage;
        self
    }

    /// Appends a decorator. No-op decorators are dropped.
    pub fn add_scope_decorator(mut self, decorator: Arc<dyn ScopeDecorator>) -> Self {
        if !decorator.is_noop() {
            self.decorators.push(decorator);
        }
        self
    }

    /// Finishes the scope manager.
    pub fn build(self) -> CurrentTraceContext {
        CurrentTraceContext {
            storage: self.storage,
            decorators: self.decorators.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn context(span_id: u64) -> TraceContext {
        TraceContext::builder().trace_id(1).span_id(span_id).build().unwrap()
    }

    #[test]
    fn test_new_scope_restores_previous() {
        let current = CurrentTraceContext::thread_local();
        assert_eq!(current.get(), None);
        {
            let _outer = current.new_scope(Some(&context(1)));
            {
                let _inner = current.new_scope(Some(&context(2)));
                assert_eq!(current.get(), Some(context(2)));
            }
            assert_eq!(current.get(), Some(context(1)));
            let cleared = current.new_scope(None);
            assert_eq!(current.get(), None);
            cleared.close();
            assert_eq!(current.get(), Some(context(1)));
        }
        assert_eq!(current.get(), None);
    }

    #[test]
    fn test_maybe_scope_on_current_is_noop() {
        let current = CurrentTraceContext::thread_local();
        let scope = current.new_scope(Some(&context(1)));
        let same = current.maybe_scope(Some(&context(1)));
        assert!(same.is_noop());
        drop(same);
        assert_eq!(current.get(), Some(context(1)));
        scope.close();

        let other = current.maybe_scope(Some(&context(2)));
        assert!(!other.is_noop());
    }

    #[test]
    fn test_maybe_scope_keeps_installed_extra() {
        let current = CurrentTraceContext::thread_local();
        let plain = context(1);
        let _scope = current.new_scope(Some(&plain));
        let with_extra = plain.to_builder().add_extra(Arc::new(5u8)).build().unwrap();
        let _same = current.maybe_scope(Some(&with_extra));
        let installed = current.get().unwrap();
        assert!(installed.find_extra::<u8>().is_none());
    }

    thread_local! {
        static ORDER: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
    }

    struct Tagger(&'static str);

    impl ScopeDecorator for Tagger {
        fn decorate_scope(&self, _context: Option<&TraceContext>, scope: Box<dyn Scope>) -> Box<dyn Scope> {
            ORDER.with(|order| order.borrow_mut().push(self.0));
            scope
        }
    }

    #[test]
    fn test_decorators_run_in_order() {
        let current = CurrentTraceContext::builder()
            .add_scope_decorator(Arc::new(Tagger("first")))
            .add_scope_decorator(Arc::new(NoopScopeDecorator))
            .add_scope_decorator(Arc::new(Tagger("second")))
            .build();
        let scope = current.new_scope(Some(&context(1)));
        ORDER.with(|order| assert_eq!(*order.borrow(), vec!["first", "second"]));
        scope.close();
        assert_eq!(current.get(), None);
    }
}
