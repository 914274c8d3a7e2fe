//! Immediate propagation of baggage updates into open correlation scopes.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use smallvec::SmallVec;

use super::update_scope::CorrelationUpdateScope;
use crate::baggage::BaggageField;
use crate::current::Scope;

thread_local! {
    static UPDATE_SCOPES: RefCell<Vec<Rc<dyn CorrelationUpdateScope>>> = RefCell::new(Vec::new());
}

/// Keeps an update scope on this thread's flush stack until closed.
pub(crate) struct FlushScope {
    update_scope: Rc<dyn CorrelationUpdateScope>,
}

impl FlushScope {
    pub(crate) fn push(update_scope: Rc<dyn CorrelationUpdateScope>) -> Self {
        let _ = UPDATE_SCOPES.try_with(|stack| stack.borrow_mut().push(Rc::clone(&update_scope)));
        Self { update_scope }
    }
}

impl Scope for FlushScope {
    fn close(&self) {
        let target = Rc::as_ptr(&self.update_scope).cast::<()>();
        let _ = UPDATE_SCOPES.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(index) = stack.iter().rposition(|s| Rc::as_ptr(s).cast::<()>() == target) {
                stack.remove(index);
            }
        });
        self.update_scope.close();
    }
}

/// Writes a changed baggage value into every open scope on this thread that tracks `field`.
///
/// Each distinct store is written at most once, and only when it holds a
/// different value. Every tracking scope then marks the field dirty so the
/// store is reverted when that scope closes.
pub fn flush(field: &BaggageField, value: Option<&str>) {
    let scopes: Vec<Rc<dyn CorrelationUpdateScope>> = UPDATE_SCOPES
        .try_with(|stack| stack.borrow().iter().rev().cloned().collect())
        .unwrap_or_default();
    if scopes.is_empty() {
        return;
    }

    let mut synced: SmallVec<[*const (); 4]> = SmallVec::new();
    for scope in &scopes {
        let Some(name) = scope.name(field) else {
            continue;
        };
        let context = scope.context();
        let key = Arc::as_ptr(context).cast::<()>();
        if !synced.contains(&key) {
            if context.get_value(name).as_deref() != value {
                context.update(name, value);
            }
            synced.push(key);
        }
        scope.handle_update(field, value);
    }
    tracing::trace!(field = %field, ?value, scopes = scopes.len(), "flushed correlation update");
}
