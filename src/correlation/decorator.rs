use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use super::config::SingleCorrelationField;
use super::flush::FlushScope;
use super::update_scope::{DirtyBits, MultipleUpdateScope, SingleUpdateScope};
use super::CorrelationContext;
use crate::baggage;
use crate::core::{PropagationError, Result};
use crate::current::{NoopScopeDecorator, Scope, ScopeDecorator};
use crate::propagation::TraceContext;

/// Most fields one decorator can track.
pub const MAX_FIELDS: usize = 32;

/// Entry point for building correlation decorators.
pub struct CorrelationScopeDecorator;

impl CorrelationScopeDecorator {
    /// Builder writing into `context`, pre-populated with `traceId` and `spanId`.
    pub fn builder(context: Arc<dyn CorrelationContext>) -> CorrelationScopeDecoratorBuilder {
        CorrelationScopeDecoratorBuilder {
            context,
            fields: Vec::new(),
            names: HashSet::new(),
        }
        .with_default_fields()
    }
}

/// Builder for [`CorrelationScopeDecorator`]. Starts with traceId and spanId.
pub struct CorrelationScopeDecoratorBuilder {
    context: Arc<dyn CorrelationContext>,
    fields: Vec<SingleCorrelationField>,
    names: HashSet<String>,
}

impl CorrelationScopeDecoratorBuilder {
    fn with_default_fields(mut self) -> Self {
        for field in [baggage::trace_id(), baggage::span_id()] {
            let config = SingleCorrelationField::create(field);
            self.names.insert(config.name().to_lowercase());
            self.fields.push(config);
        }
        self
    }

    /// Removes every field, including the defaults.
    pub fn clear(mut self) -> Self {
        self.fields.clear();
        self.names.clear();
        self
    }

    /// Adds a field. A baggage field or store key may only appear once.
    pub fn add(mut self, config: SingleCorrelationField) -> Result<Self> {
        if self.fields.iter().any(|f| f.field() == config.field()) {
            return Err(PropagationError::DuplicateField(config.field().name().to_string()));
        }
        if !self.names.insert(config.name().to_lowercase()) {
            return Err(PropagationError::DuplicateName(config.name().to_string()));
        }
        self.fields.push(config);
        Ok(self)
    }

    /// Fields added so far.
    pub fn fields(&self) -> &[SingleCorrelationField] {
        &self.fields
    }

    /// Fails when more than [`MAX_FIELDS`] fields are configured.
    pub fn build(self) -> Result<Arc<dyn ScopeDecorator>> {
        let count = self.fields.len();
        if count > MAX_FIELDS {
            return Err(PropagationError::TooManyFields {
                count,
                limit: MAX_FIELDS,
            });
        }

        let context = self.context;
        let mut fields = self.fields;
        let decorator: Arc<dyn ScopeDecorator> = match fields.pop() {
            None => Arc::new(NoopScopeDecorator),
            Some(field) if fields.is_empty() => Arc::new(SingleCorrelationScopeDecorator { context, field }),
            Some(last) => {
                fields.push(last);
                let flush_on_update = fields.iter().any(SingleCorrelationField::flush_on_update);
                Arc::new(MultipleCorrelationScopeDecorator {
                    context,
                    fields: fields.into(),
                    flush_on_update,
                })
            }
        };
        tracing::debug!(fields = count, "built correlation scope decorator");
        Ok(decorator)
    }
}

struct SingleCorrelationScopeDecorator {
    context: Arc<dyn CorrelationContext>,
    field: SingleCorrelationField,
}

impl ScopeDecorator for SingleCorrelationScopeDecorator {
    fn decorate_scope(&self, context: Option<&TraceContext>, scope: Box<dyn Scope>) -> Box<dyn Scope> {
        let name = self.field.name();
        let value_to_revert = self.context.get_value(name);
        let current_value = context.and_then(|c| self.field.field().get_value(c));

        let mut dirty = false;
        if (!scope.is_noop() || !self.field.read_only()) && current_value != value_to_revert {
            self.context.update(name, current_value.as_deref());
            dirty = true;
        }
        dirty |= self.field.dirty();

        if !dirty && !self.field.flush_on_update() {
            return scope;
        }

        let update = SingleUpdateScope::new(
            scope,
            Arc::clone(&self.context),
            self.field.clone(),
            value_to_revert,
            dirty,
        );
        if self.field.flush_on_update() {
            Box::new(FlushScope::push(Rc::new(update)))
        } else {
            Box::new(update)
        }
    }
}

struct MultipleCorrelationScopeDecorator {
    context: Arc<dyn CorrelationContext>,
    fields: Arc<[SingleCorrelationField]>,
    flush_on_update: bool,
}

impl ScopeDecorator for MultipleCorrelationScopeDecorator {
    fn decorate_scope(&self, context: Option<&TraceContext>, scope: Box<dyn Scope>) -> Box<dyn Scope> {
        let mut dirty = DirtyBits::EMPTY;
        let mut values_to_revert = Vec::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            let value_to_revert = self.context.get_value(field.name());
            let current_value = context.and_then(|c| field.field().get_value(c));

            if (!scope.is_noop() || !field.read_only()) && current_value != value_to_revert {
                self.context.update(field.name(), current_value.as_deref());
                dirty = dirty.set_bit(i);
            }
            if field.dirty() {
                dirty = dirty.set_bit(i);
            }
            values_to_revert.push(value_to_revert);
        }

        if dirty.is_empty() && !self.flush_on_update {
            return scope;
        }

        let update = MultipleUpdateScope::new(
            scope,
            Arc::clone(&self.context),
            Arc::clone(&self.fields),
            values_to_revert,
            dirty,
        );
        if self.flush_on_update {
            Box::new(FlushScope::push(Rc::new(update)))
        } else {
            Box::new(update)
        }
    }
}
