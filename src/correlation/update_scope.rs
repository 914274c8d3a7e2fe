//! Scopes that revert correlation keys changed on entry or by later updates.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::config::SingleCorrelationField;
use super::CorrelationContext;
use crate::baggage::BaggageField;
use crate::current::Scope;

/// Which of up to 32 fields must be reverted on close.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirtyBits(u32);

impl DirtyBits {
    /// No field dirty.
    pub const EMPTY: DirtyBits = DirtyBits(0);

    /// Marks field `index`.
    #[must_use]
    pub fn set_bit(self, index: usize) -> Self {
        debug_assert!(index < 32);
        DirtyBits(self.0 | (1 << index))
    }

    /// Whether field `index` is marked.
    pub fn is_set(self, index: usize) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }

    /// True when no field is marked.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Scope wrapper that knows which store keys it may have to revert.
pub trait CorrelationUpdateScope: Scope {
    /// Store key for `field`, if this scope flushes its updates.
    fn name(&self, field: &BaggageField) -> Option<&str>;

    /// Marks `field` dirty when `value` differs from what the store held on entry.
    fn handle_update(&self, field: &BaggageField, value: Option<&str>);

    /// Store the scope writes into.
    fn context(&self) -> &Arc<dyn CorrelationContext>;
}

pub(crate) struct SingleUpdateScope {
    delegate: Box<dyn Scope>,
    context: Arc<dyn CorrelationContext>,
    field: SingleCorrelationField,
    value_to_revert: Option<String>,
    dirty: Cell<bool>,
    closed: AtomicBool,
}

impl SingleUpdateScope {
    pub(crate) fn new(
        delegate: Box<dyn Scope>,
        context: Arc<dyn CorrelationContext>,
        field: SingleCorrelationField,
        value_to_revert: Option<String>,
        dirty: bool,
    ) -> Self {
        Self {
            delegate,
            context,
            field,
            value_to_revert,
            dirty: Cell::new(dirty),
            closed: AtomicBool::new(false),
        }
    }
}

impl Scope for SingleUpdateScope {
    fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.delegate.close();
        if self.dirty.get() {
            self.context.update(self.field.name(), self.value_to_revert.as_deref());
        }
    }
}

impl CorrelationUpdateScope for SingleUpdateScope {
    fn name(&self, field: &BaggageField) -> Option<&str> {
        (self.field.field() == field).then(|| self.field.name())
    }

    fn handle_update(&self, field: &BaggageField, value: Option<&str>) {
        if self.field.field() != field {
            return;
        }
        if value != self.value_to_revert.as_deref() {
            self.dirty.set(true);
        }
    }

    fn context(&self) -> &Arc<dyn CorrelationContext> {
        &self.context
    }
}

pub(crate) struct MultipleUpdateScope {
    delegate: Box<dyn Scope>,
    context: Arc<dyn CorrelationContext>,
    fields: Arc<[SingleCorrelationField]>,
    values_to_revert: Vec<Option<String>>,
    dirty: Cell<DirtyBits>,
    closed: AtomicBool,
}

impl MultipleUpdateScope {
    pub(crate) fn new(
        delegate: Box<dyn Scope>,
        context: Arc<dyn CorrelationContext>,
        fields: Arc<[SingleCorrelationField]>,
        values_to_revert: Vec<Option<String>>,
        dirty: DirtyBits,
    ) -> Self {
        Self {
            delegate,
            context,
            fields,
            values_to_revert,
            dirty: Cell::new(dirty),
            closed: AtomicBool::new(false),
        }
    }
}

impl Scope for MultipleUpdateScope {
    fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.delegate.close();
        let dirty = self.dirty.get();
        for (i, field) in self.fields.iter().enumerate() {
            if dirty.is_set(i) {
                self.context.update(field.name(), self.values_to_revert[i].as_deref());
            }
        }
    }
}

impl CorrelationUpdateScope for MultipleUpdateScope {
    fn name(&self, field: &BaggageField) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.flush_on_update() && f.field() == field)
            .map(SingleCorrelationField::name)
    }

    fn handle_update(&self, field: &BaggageField, value: Option<&str>) {
        let mut dirty = self.dirty.get();
        for (i, config) in self.fields.iter().enumerate() {
            if config.flush_on_update() && config.field() == field && value != self.values_to_revert[i].as_deref() {
                dirty = dirty.set_bit(i);
            }
        }
        self.dirty.set(dirty);
    }

    fn context(&self) -> &Arc<dyn CorrelationContext> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::MapCorrelationContext;
    use crate::current::NoopScope;

    #[test]
    fn test_dirty_bits() {
        let bits = DirtyBits::EMPTY.set_bit(0).set_bit(31);
        assert!(bits.is_set(0));
        assert!(bits.is_set(31));
        assert!(!bits.is_set(1));
        assert!(!bits.is_set(32));
        assert!(DirtyBits::EMPTY.is_empty());
    }

    #[test]
    fn test_single_reverts_only_when_dirty() {
        let store = Arc::new(MapCorrelationContext::new());
        store.update("userId", Some("before"));
        let user = BaggageField::create("userId").unwrap();
        let field = SingleCorrelationField::create(user.clone());

        let scope = SingleUpdateScope::new(Box::new(NoopScope), store.clone(), field, Some("before".into()), false);
        store.update("userId", Some("during"));
        scope.handle_update(&user, Some("before"));
        scope.close();
        assert_eq!(store.get_value("userId").as_deref(), Some("during"));
    }

    #[test]
    fn test_single_close_is_idempotent() {
        let store = Arc::new(MapCorrelationContext::new());
        let user = BaggageField::create("userId").unwrap();
        let field = SingleCorrelationField::create(user.clone());

        let scope = SingleUpdateScope::new(Box::new(NoopScope), store.clone(), field, None, false);
        store.update("userId", Some("during"));
        scope.handle_update(&user, Some("during"));
        scope.close();
        assert_eq!(store.get_value("userId"), None);

        store.update("userId", Some("later"));
        scope.close();
        assert_eq!(store.get_value("userId").as_deref(), Some("later"));
    }
}
