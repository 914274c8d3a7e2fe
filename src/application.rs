//! Assembles the propagation engine from a validated configuration.

use crate::baggage::{self, BaggageField, BaggagePropagation, SingleBaggageField};
use crate::core::{Config, PropagationError, Result};
use crate::correlation::{CorrelationContext, CorrelationScopeDecorator, SingleCorrelationField};
use crate::current::{ContextStorage, CurrentTraceContext};
use crate::propagation::{Getter, Setter, TraceContext, TraceContextOrSamplingFlags};
use crate::request::RequestScope;
use std::fmt;
use std::sync::Arc;

/// Baggage propagation, correlation and the scope manager wired together.
pub struct Application {
    /// Application configuration
    config: Config,
    /// Scope manager with the correlation decorator installed
    current: CurrentTraceContext,
    /// B3 plus baggage propagation
    baggage: BaggagePropagation,
    /// Read-only constant fields
    constants: Vec<BaggageField>,
    /// Store the correlation decorator writes into
    correlation_context: Arc<dyn CorrelationContext>,
}

impl Application {
    /// Create a new Application writing correlation fields into `store`.
    pub fn new(config: Config, store: Arc<dyn CorrelationContext>) -> Result<Self> {
        config.validate()?;

        let mut builder = BaggagePropagation::builder();
        for field in &config.baggage.fields {
            let baggage_field = BaggageField::create(&field.name)?;
            let single = if field.local {
                SingleBaggageField::local(baggage_field)
            } else {
                field
                    .remote_keys
                    .iter()
                    .try_fold(SingleBaggageField::remote(baggage_field), |b, key| b.add_key_name(key))?
                    .build()
            };
            builder = builder.add(single)?;
        }
        let baggage = builder.build();

        let constants = config
            .baggage
            .constants
            .iter()
            .map(|(name, value)| baggage::constant(name, value))
            .collect::<Result<Vec<_>>>()?;

        let mut decorator = CorrelationScopeDecorator::builder(Arc::clone(&store));
        if !config.correlation.include_defaults {
            decorator = decorator.clear();
        }
        for mapping in &config.correlation.fields {
            let field = resolve(&baggage, &constants, &mapping.baggage).ok_or_else(|| {
                PropagationError::config(format!("unknown baggage field '{}'", mapping.baggage))
            })?;
            let mut single = SingleCorrelationField::builder(field);
            if let Some(name) = &mapping.name {
                single = single.name(name)?;
            }
            if mapping.dirty {
                single = single.dirty();
            }
            if mapping.flush_on_update {
                single = single.flush_on_update();
            }
            decorator = decorator.add(single.build())?;
        }

        let storage = if config.scope.inheritable {
            ContextStorage::Inheritable
        } else {
            ContextStorage::ThreadLocal
        };
        let current = CurrentTraceContext::builder()
            .storage(storage)
            .add_scope_decorator(decorator.build()?)
            .build();

        tracing::info!(
            baggage_fields = baggage.fields().len(),
            constants = constants.len(),
            correlation_fields = config.correlation.fields.len(),
            ?storage,
            "propagation engine assembled"
        );

        Ok(Self {
            config,
            current,
            baggage,
            constants,
            correlation_context: store,
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a reference to the scope manager.
    pub fn current(&self) -> &CurrentTraceContext {
        &self.current
    }

    /// Get a reference to the baggage propagation.
    pub fn baggage(&self) -> &BaggagePropagation {
        &self.baggage
    }

    /// Get a reference to the correlation store.
    pub fn correlation_context(&self) -> &Arc<dyn CorrelationContext> {
        &self.correlation_context
    }

    /// Looks up a configured field, constant or built-in field by name, case-insensitively.
    pub fn field(&self, name: &str) -> Option<BaggageField> {
        resolve(&self.baggage, &self.constants, name)
    }

    /// Extracts B3 state and baggage from an inbound carrier.
    pub fn extract<G: Getter + ?Sized>(&self, carrier: &G) -> TraceContextOrSamplingFlags {
        self.baggage.extract(carrier)
    }

    /// Writes B3 state and remote baggage into an outbound carrier.
    pub fn inject<S: Setter + ?Sized>(&self, context: &TraceContext, carrier: &mut S) {
        self.baggage.inject(context, carrier);
    }

    /// Derives a context for an inbound request and makes it current.
    pub fn start_request(&self, extracted: &TraceContextOrSamplingFlags) -> RequestScope {
        RequestScope::start(&self.current, &self.baggage, extracted)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("current", &self.current)
            .field("baggage", &self.baggage)
            .field("constants", &self.constants)
            .finish_non_exhaustive()
    }
}

fn resolve(baggage: &BaggagePropagation, constants: &[BaggageField], name: &str) -> Option<BaggageField> {
    let lc_name = name.trim().to_lowercase();
    baggage
        .fields()
        .iter()
        .chain(constants)
        .find(|field| field.lc_name() == lc_name)
        .cloned()
        .or_else(|| baggage::builtin_by_name(&lc_name))
}
