//! Extraction and injection of baggage alongside B3 headers.

use std::collections::HashSet;
use std::sync::Arc;

use super::field::{validate_name, BaggageField};
use super::fields::BaggageFields;
use crate::core::{PropagationError, Result};
use crate::propagation::{B3Propagation, Getter, Setter, TraceContext, TraceContextOrSamplingFlags};

/// How one field travels: over the wire under key names, or only in-process.
#[derive(Debug, Clone)]
pub struct SingleBaggageField {
    field: BaggageField,
    key_names: Vec<String>,
}

impl SingleBaggageField {
    /// Propagated remotely, by default under the lower-cased field name.
    pub fn remote(field: BaggageField) -> SingleBaggageFieldBuilder {
        let key_names = vec![field.lc_name().to_string()];
        SingleBaggageFieldBuilder { field, key_names }
    }

    /// Kept in-process only.
    pub fn local(field: BaggageField) -> Self {
        Self {
            field,
            key_names: Vec::new(),
        }
    }

    /// The propagated field.
    pub fn field(&self) -> &BaggageField {
        &self.field
    }

    /// Carrier keys, in lookup order. Empty for local fields.
    pub fn key_names(&self) -> &[String] {
        &self.key_names
    }

    /// True when the field never leaves the process.
    pub fn is_local(&self) -> bool {
        self.key_names.is_empty()
    }
}

/// Builder for a remote [`SingleBaggageField`].
#[derive(Debug, Clone)]
pub struct SingleBaggageFieldBuilder {
    field: BaggageField,
    key_names: Vec<String>,
}

impl SingleBaggageFieldBuilder {
    /// Adds another carrier key. Keys are lower-cased.
    pub fn add_key_name(mut self, key_name: &str) -> Result<Self> {
        let key_name = validate_name(key_name)?.to_lowercase();
        if !self.key_names.contains(&key_name) {
            self.key_names.push(key_name);
        }
        Ok(self)
    }

    /// Finishes the configuration.
    pub fn build(self) -> SingleBaggageField {
        SingleBaggageField {
            field: self.field,
            key_names: self.key_names,
        }
    }
}

/// B3 plus baggage: every context gets exactly one [`BaggageFields`] container.
#[derive(Debug, Clone)]
pub struct BaggagePropagation {
    b3: B3Propagation,
    configs: Arc<[SingleBaggageField]>,
    fields: Arc<[BaggageField]>,
}

impl BaggagePropagation {
    /// Starts an empty builder.
    pub fn builder() -> BaggagePropagationBuilder {
        BaggagePropagationBuilder::default()
    }

    /// Fields in the order they were added.
    pub fn configs(&self) -> &[SingleBaggageField] {
        &self.configs
    }

    /// Fields stored in each context's container, in configuration order.
    pub fn fields(&self) -> &[BaggageField] {
        &self.fields
    }

    /// B3 keys followed by every remote baggage key.
    pub fn keys(&self) -> Vec<String> {
        self.b3
            .keys()
            .iter()
            .map(|k| (*k).to_string())
            .chain(self.configs.iter().flat_map(|c| c.key_names().iter().cloned()))
            .collect()
    }

    /// Ensures `context` owns exactly one container.
    ///
    /// A context without one gets a fresh container; a context still sharing
    /// a container claimed by another span gets a fork of it.
    pub fn decorate(&self, context: TraceContext) -> TraceContext {
        if self.fields.is_empty() {
            return context;
        }
        match context.find_extra::<BaggageFields>() {
            Some(fields) if fields.try_to_claim(context.trace_id(), context.span_id()) => context,
            Some(fields) => {
                let forked = Arc::new(fields.fork());
                forked.try_to_claim(context.trace_id(), context.span_id());
                let extra = context.extra().with(forked);
                context.with_extra(extra)
            }
            None => {
                let fresh = Arc::new(BaggageFields::with_fields(Arc::clone(&self.fields)));
                fresh.try_to_claim(context.trace_id(), context.span_id());
                let extra = context.extra().with(fresh);
                context.with_extra(extra)
            }
        }
    }

    /// Extracts B3 state and every remote baggage value into a new container.
    pub fn extract<G: Getter + ?Sized>(&self, carrier: &G) -> TraceContextOrSamplingFlags {
        let extracted = self.b3.extract(carrier);
        if self.fields.is_empty() {
            return extracted;
        }

        let container = BaggageFields::with_fields(Arc::clone(&self.fields));
        for config in self.configs.iter() {
            let value = config.key_names().iter().find_map(|key| carrier.get(key));
            if let Some(value) = value {
                container.update_value(config.field(), Some(value));
            }
        }

        TraceContextOrSamplingFlags::builder(extracted.value().clone())
            .extra(extracted.extra())
            .add_extra(Arc::new(container))
            .build()
    }

    /// Writes B3 headers and the first key of each remote field that has a value.
    pub fn inject<S: Setter + ?Sized>(&self, context: &TraceContext, carrier: &mut S) {
        self.b3.inject(context, carrier);
        let Some(fields) = context.find_extra::<BaggageFields>() else {
            return;
        };
        for config in self.configs.iter().filter(|c| !c.is_local()) {
            if let (Some(key), Some(value)) = (config.key_names().first(), fields.get_value(config.field())) {
                carrier.put(key, &value);
            }
        }
    }
}

/// Builder for [`BaggagePropagation`].
#[derive(Debug, Default)]
pub struct BaggagePropagationBuilder {
    configs: Vec<SingleBaggageField>,
    keys: HashSet<String>,
}

impl BaggagePropagationBuilder {
    /// Rejects a field added twice and a carrier key claimed by two fields.
    pub fn add(mut self, config: SingleBaggageField) -> Result<Self> {
        if self.configs.iter().any(|c| c.field() == config.field()) {
            return Err(PropagationError::DuplicateField(config.field().name().to_string()));
        }
        for key in config.key_names() {
            if !self.keys.insert(key.clone()) {
                return Err(PropagationError::DuplicateKey(key.clone()));
            }
        }
        self.configs.push(config);
        Ok(self)
    }

    /// Finishes the propagation.
    pub fn build(self) -> BaggagePropagation {
        let fields: Arc<[BaggageField]> = self.configs.iter().map(|c| c.field().clone()).collect();
        BaggagePropagation {
            b3: B3Propagation,
            configs: self.configs.into(),
            fields,
        }
    }
}
