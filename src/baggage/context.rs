//! Storage strategies behind a [`BaggageField`](super::BaggageField).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::field::BaggageField;
use super::fields::BaggageFields;
use crate::propagation::{Extra, TraceContext, TraceContextOrSamplingFlags};

/// Borrowed view of wherever a value may live.
#[derive(Clone, Copy, Debug)]
pub enum ContextRef<'a> {
    /// A full trace context
    Context(&'a TraceContext),
    /// Extraction result, before a context exists
    Extracted(&'a TraceContextOrSamplingFlags),
}

impl<'a> ContextRef<'a> {
    /// The full context, if there is one.
    pub fn context(self) -> Option<&'a TraceContext> {
        match self {
            ContextRef::Context(context) => Some(context),
            ContextRef::Extracted(extracted) => extracted.context(),
        }
    }

    /// Extra state of whichever side this refers to.
    pub fn extra(self) -> &'a Extra {
        match self {
            ContextRef::Context(context) => context.extra(),
            ContextRef::Extracted(extracted) => extracted.effective_extra(),
        }
    }

    /// First extra value of type `T`, if any.
    pub fn find_extra<T: Any + Send + Sync>(self) -> Option<Arc<T>> {
        self.extra().get::<T>()
    }
}

impl<'a> From<&'a TraceContext> for ContextRef<'a> {
    fn from(context: &'a TraceContext) -> Self {
        ContextRef::Context(context)
    }
}

impl<'a> From<&'a TraceContextOrSamplingFlags> for ContextRef<'a> {
    fn from(extracted: &'a TraceContextOrSamplingFlags) -> Self {
        ContextRef::Extracted(extracted)
    }
}

/// Where a field's value is read from and written to.
pub trait BaggageContext: Send + Sync + fmt::Debug {
    /// Current value, `None` when absent.
    fn get_value(&self, field: &BaggageField, context: ContextRef<'_>) -> Option<String>;

    /// Returns true when the stored value changed.
    fn update_value(&self, field: &BaggageField, context: ContextRef<'_>, value: Option<&str>) -> bool;

    /// Whether updates are rejected.
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Default storage: the [`BaggageFields`] container in the context's extra.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtraBaggageContext;

impl BaggageContext for ExtraBaggageContext {
    fn get_value(&self, field: &BaggageField, context: ContextRef<'_>) -> Option<String> {
        context.find_extra::<BaggageFields>()?.get_value(field)
    }

    fn update_value(&self, field: &BaggageField, context: ContextRef<'_>, value: Option<&str>) -> bool {
        match context.find_extra::<BaggageFields>() {
            Some(fields) => fields.update_value(field, value),
            None => false,
        }
    }
}

/// Values derived from the context itself. Updates are always rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOnlyValue {
    /// Lower-hex trace id, 16 or 32 characters
    TraceId,
    /// Parent span id, absent on a root span
    ParentId,
    /// Lower-hex span id
    SpanId,
    /// Sampling decision as `true`/`false`
    Sampled,
    /// Fixed value
    Constant(String),
}

impl BaggageContext for ReadOnlyValue {
    fn get_value(&self, _field: &BaggageField, context: ContextRef<'_>) -> Option<String> {
        match self {
            ReadOnlyValue::Constant(value) => Some(value.clone()),
            ReadOnlyValue::TraceId => match context {
                ContextRef::Extracted(extracted) if extracted.context().is_none() => {
                    extracted.trace_id_context().map(|t| t.trace_id_string())
                }
                _ => context.context().map(|c| c.trace_id_string().to_string()),
            },
            ReadOnlyValue::ParentId => context
                .context()
                .and_then(TraceContext::parent_id_string)
                .map(str::to_string),
            ReadOnlyValue::SpanId => context.context().map(|c| c.span_id_string().to_string()),
            ReadOnlyValue::Sampled => {
                let sampled = match context {
                    ContextRef::Context(context) => context.sampled(),
                    ContextRef::Extracted(extracted) => extracted.sampled(),
                };
                sampled.map(|s| s.to_string())
            }
        }
    }

    fn update_value(&self, _field: &BaggageField, _context: ContextRef<'_>, _value: Option<&str>) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        true
    }
}
