use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::context::{BaggageContext, ContextRef, ExtraBaggageContext};
use super::fields::BaggageFields;
use crate::core::{PropagationError, Result};
use crate::correlation;
use crate::current::CurrentTraceContext;

struct FieldInner {
    name: String,
    lc_name: String,
    context: Arc<dyn BaggageContext>,
}

/// A named value propagated with a trace.
///
/// Identity is the name compared case-insensitively. Storage is fixed at
/// creation: [`BaggageField::create`] stores values in the context's
/// [`BaggageFields`] container, built-ins derive them from the context.
#[derive(Clone)]
pub struct BaggageField(Arc<FieldInner>);

impl BaggageField {
    /// Creates a field stored in the context's extra.
    pub fn create(name: &str) -> Result<Self> {
        Self::with_context(name, Arc::new(ExtraBaggageContext))
    }

    /// Creates a field over custom storage.
    pub fn with_context(name: &str, context: Arc<dyn BaggageContext>) -> Result<Self> {
        let name = validate_name(name)?;
        Ok(Self::from_parts(name, context))
    }

    /// Caller guarantees `name` is trimmed and non-empty.
    pub(crate) fn from_parts(name: String, context: Arc<dyn BaggageContext>) -> Self {
        Self(Arc::new(FieldInner {
            lc_name: name.to_lowercase(),
            name,
            context,
        }))
    }

    /// Name as it was created.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub(crate) fn lc_name(&self) -> &str {
        &self.0.lc_name
    }

    /// True when updates are always rejected.
    pub fn is_read_only(&self) -> bool {
        self.0.context.is_read_only()
    }

    /// Value in the given context.
    pub fn get_value<'a>(&self, context: impl Into<ContextRef<'a>>) -> Option<String> {
        self.0.context.get_value(self, context.into())
    }

    /// Updates the value, flushing it to correlation scopes that track it.
    ///
    /// Returns false when the field is read-only, has no storage in this
    /// context, or already held the value.
    pub fn update_value<'a>(&self, context: impl Into<ContextRef<'a>>, value: Option<&str>) -> bool {
        if !self.0.context.update_value(self, context.into(), value) {
            return false;
        }
        tracing::trace!(field = %self.0.name, ?value, "baggage updated");
        correlation::flush(self, value);
        true
    }

    /// Value in the current context, if any.
    pub fn get_current_value(&self, current: &CurrentTraceContext) -> Option<String> {
        current.get().and_then(|context| self.get_value(&context))
    }

    /// Updates the value in the current context. False when there is none.
    pub fn update_current_value(&self, current: &CurrentTraceContext, value: Option<&str>) -> bool {
        match current.get() {
            Some(context) => self.update_value(&context, value),
            None => false,
        }
    }

    /// Looks up a configured field by name, case-insensitively.
    ///
    /// Fails on an empty name. Built-in fields are never returned.
    pub fn get_by_name<'a>(context: impl Into<ContextRef<'a>>, name: &str) -> Result<Option<Self>> {
        let name = validate_name(name)?;
        Ok(context
            .into()
            .find_extra::<BaggageFields>()
            .and_then(|fields| fields.find_by_name(&name)))
    }

    /// Every field configured in the context's container.
    pub fn get_all<'a>(context: impl Into<ContextRef<'a>>) -> Vec<Self> {
        context
            .into()
            .find_extra::<BaggageFields>()
            .map(|fields| fields.get_all_fields())
            .unwrap_or_default()
    }

    /// Name and value of every field holding a non-empty value.
    pub fn get_all_values<'a>(context: impl Into<ContextRef<'a>>) -> Vec<(String, String)> {
        context
            .into()
            .find_extra::<BaggageFields>()
            .map(|fields| fields.get_all_values())
            .unwrap_or_default()
    }
}

pub(crate) fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PropagationError::invalid_argument("name is empty"));
    }
    Ok(trimmed.to_string())
}

impl PartialEq for BaggageField {
    fn eq(&self, other: &Self) -> bool {
        self.0.lc_name == other.0.lc_name
    }
}

impl Eq for BaggageField {}

impl Hash for BaggageField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.lc_name.hash(state);
    }
}

impl fmt::Debug for BaggageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaggageField")
            .field("name", &self.0.name)
            .field("context", &self.0.context)
            .finish()
    }
}

impl fmt::Display for BaggageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}
