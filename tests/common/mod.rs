//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::sync::Arc;
use urpo_propagation::baggage::{BaggageField, BaggagePropagation, SingleBaggageField};
use urpo_propagation::correlation::{
    CorrelationContext, CorrelationScopeDecorator, MapCorrelationContext, SingleCorrelationField,
};
use urpo_propagation::current::CurrentTraceContext;
use urpo_propagation::TraceContext;

/// Context with fixed ids and no baggage.
pub fn context(trace_id: u64, span_id: u64) -> TraceContext {
    TraceContext::builder()
        .trace_id(trace_id)
        .span_id(span_id)
        .build()
        .unwrap()
}

/// Local baggage fields created from `names`.
pub fn fields(names: &[&str]) -> Vec<BaggageField> {
    names.iter().map(|name| BaggageField::create(name).unwrap()).collect()
}

/// Propagation storing `fields` in-process only.
pub fn local_baggage(fields: &[BaggageField]) -> BaggagePropagation {
    fields
        .iter()
        .fold(BaggagePropagation::builder(), |builder, field| {
            builder.add(SingleBaggageField::local(field.clone())).unwrap()
        })
        .build()
}

/// Context carrying a container for `fields`, with values set from `values`.
pub fn context_with(
    baggage: &BaggagePropagation,
    span_id: u64,
    values: &[(&BaggageField, &str)],
) -> TraceContext {
    let context = baggage.decorate(context(1, span_id));
    for (field, value) in values {
        assert!(field.update_value(&context, Some(value)));
    }
    context
}

/// Fresh shared-map correlation store.
pub fn store() -> Arc<MapCorrelationContext> {
    Arc::new(MapCorrelationContext::new())
}

/// Scope manager mirroring `configs` into `store`, without the default id fields.
pub fn correlated(
    store: &Arc<MapCorrelationContext>,
    configs: Vec<SingleCorrelationField>,
) -> CurrentTraceContext {
    let store: Arc<dyn CorrelationContext> = store.clone();
    let decorator = configs
        .into_iter()
        .fold(CorrelationScopeDecorator::builder(store).clear(), |builder, config| {
            builder.add(config).unwrap()
        })
        .build()
        .unwrap();
    CurrentTraceContext::builder().add_scope_decorator(decorator).build()
}
