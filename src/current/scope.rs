//! Scopes and the decorators that run when a scope opens.

use std::fmt;

use crate::propagation::TraceContext;

/// A closable extent during which a context is current.
///
/// `close` must be safe to call more than once; only the first call acts.
pub trait Scope {
    /// Restores whatever was current before. Idempotent.
    fn close(&self);

    /// True for the scope returned when nothing was swapped.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Scope that changed nothing and restores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScope;

impl Scope for NoopScope {
    fn close(&self) {}

    fn is_noop(&self) -> bool {
        true
    }
}

/// Guard returned by the scope manager. Closes on drop.
///
/// Not `Send`: a scope must close on the thread that opened it.
#[must_use = "the previous context is restored when the scope is dropped"]
pub struct CurrentScope {
    inner: Box<dyn Scope>,
}

impl CurrentScope {
    pub(crate) fn new(inner: Box<dyn Scope>) -> Self {
        Self { inner }
    }

    /// Restores the previous context. Later calls and the drop are no-ops.
    pub fn close(&self) {
        self.inner.close();
    }

    /// True for the no-op scope.
    pub fn is_noop(&self) -> bool {
        self.inner.is_noop()
    }
}

impl Drop for CurrentScope {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl fmt::Debug for CurrentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentScope").field("noop", &self.is_noop()).finish()
    }
}

/// Hook run each time a scope opens, able to wrap the scope it is given.
///
/// Decorators see the incoming context (or `None` when clearing) and the
/// scope produced so far, and return either that scope or one wrapping it.
pub trait ScopeDecorator: Send + Sync {
    /// Wraps `scope`, running side effects for `context`.
    fn decorate_scope(&self, context: Option<&TraceContext>, scope: Box<dyn Scope>) -> Box<dyn Scope>;

    /// True when the decorator never does anything.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Decorator that returns scopes unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScopeDecorator;

impl ScopeDecorator for NoopScopeDecorator {
    fn decorate_scope(&self, _context: Option<&TraceContext>, scope: Box<dyn Scope>) -> Box<dyn Scope> {
        scope
    }

    fn is_noop(&self) -> bool {
        true
    }
}
