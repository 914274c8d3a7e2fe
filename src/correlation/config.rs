use crate::baggage::field::validate_name;
use crate::baggage::BaggageField;
use crate::core::Result;

/// One baggage field mirrored into the correlation store.
#[derive(Debug, Clone)]
pub struct SingleCorrelationField {
    field: BaggageField,
    name: String,
    dirty: bool,
    flush_on_update: bool,
}

impl SingleCorrelationField {
    /// Mirrors `field` under its own name.
    pub fn create(field: BaggageField) -> Self {
        Self::builder(field).build()
    }

    /// Starts a builder for `field`, named after it.
    pub fn builder(field: BaggageField) -> SingleCorrelationFieldBuilder {
        SingleCorrelationFieldBuilder {
            name: field.name().to_string(),
            field,
            dirty: false,
            flush_on_update: false,
        }
    }

    /// The mirrored baggage field.
    pub fn field(&self) -> &BaggageField {
        &self.field
    }

    /// Store key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always written and reverted, even when the store already held the value.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Written to the store as soon as the baggage value changes.
    pub fn flush_on_update(&self) -> bool {
        self.flush_on_update
    }

    /// Derived from the field's storage.
    pub fn read_only(&self) -> bool {
        self.field.is_read_only()
    }
}

/// Builder for [`SingleCorrelationField`].
#[derive(Debug, Clone)]
pub struct SingleCorrelationFieldBuilder {
    field: BaggageField,
    name: String,
    dirty: bool,
    flush_on_update: bool,
}

impl SingleCorrelationFieldBuilder {
    /// Store key to use instead of the field name.
    pub fn name(mut self, name: &str) -> Result<Self> {
        self.name = validate_name(name)?;
        Ok(self)
    }

    /// Reverts outside writes when the scope closes.
    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    /// Writes updates made inside a scope through to the store.
    pub fn flush_on_update(mut self) -> Self {
        self.flush_on_update = true;
        self
    }

    /// Finishes the field.
    pub fn build(self) -> SingleCorrelationField {
        SingleCorrelationField {
            field: self.field,
            name: self.name,
            dirty: self.dirty,
            flush_on_update: self.flush_on_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baggage;

    #[test]
    fn test_name_defaults_to_field_name() {
        let field = SingleCorrelationField::create(baggage::trace_id());
        assert_eq!(field.name(), "traceId");
        assert!(field.read_only());
        assert!(!field.dirty());
    }

    #[test]
    fn test_custom_name() {
        let user = BaggageField::create("userId").unwrap();
        let field = SingleCorrelationField::builder(user)
            .name("user_id")
            .unwrap()
            .flush_on_update()
            .build();
        assert_eq!(field.name(), "user_id");
        assert!(field.flush_on_update());
        assert!(!field.read_only());
    }

    #[test]
    fn test_empty_name_rejected() {
        let user = BaggageField::create("userId").unwrap();
        assert!(SingleCorrelationField::builder(user).name(" ").is_err());
    }
}
