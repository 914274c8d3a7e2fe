//! Scope hot path benchmarks.
//!
//! Entering and closing scopes happens on every request and every wrapped
//! task poll, so these are the operations worth watching.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::sync::Arc;
use urpo_propagation::baggage::{BaggageField, BaggagePropagation, SingleBaggageField};
use urpo_propagation::correlation::{
    CorrelationContext, CorrelationScopeDecorator, SingleCorrelationField, ThreadLocalCorrelationContext,
};
use urpo_propagation::current::CurrentTraceContext;
use urpo_propagation::propagation::{hex, B3Propagation};
use urpo_propagation::TraceContext;

fn context(span_id: u64) -> TraceContext {
    TraceContext::builder()
        .trace_id_high(0x463a_c35c_9f64_13ad)
        .trace_id(0x4801_9e3f_86ec_d8a1)
        .span_id(span_id)
        .build()
        .unwrap()
}

/// Benchmark id rendering and parsing
fn bench_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("ids");

    group.bench_function("parse_trace_id_128", |b| {
        b.iter(|| hex::parse_trace_id(black_box("463ac35c9f6413ad48019e3f86ecd8a1")));
    });

    group.bench_function("render_trace_id_128", |b| {
        b.iter(|| hex::trace_id_string(black_box(0x463a_c35c_9f64_13ad), black_box(0x4801_9e3f_86ec_d8a1)));
    });

    group.bench_function("b3_single_extract", |b| {
        let mut headers = HashMap::new();
        headers.insert("b3".to_string(), "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1".to_string());
        b.iter(|| B3Propagation.extract(black_box(&headers)));
    });

    group.finish();
}

/// Benchmark scope enter and close with and without correlation
fn bench_scopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("scopes");
    let outer = context(1);
    let inner = context(2);

    group.bench_function("plain_new_scope", |b| {
        let current = CurrentTraceContext::thread_local();
        b.iter(|| current.new_scope(Some(black_box(&inner))));
    });

    group.bench_function("maybe_scope_same_context", |b| {
        let current = CurrentTraceContext::thread_local();
        let _scope = current.new_scope(Some(&outer));
        b.iter(|| current.maybe_scope(Some(black_box(&outer))));
    });

    for count in [1usize, 4, 16] {
        let fields: Vec<BaggageField> = (0..count)
            .map(|i| BaggageField::create(&format!("field{i}")).unwrap())
            .collect();
        let baggage = fields
            .iter()
            .fold(BaggagePropagation::builder(), |builder, field| {
                builder.add(SingleBaggageField::local(field.clone())).unwrap()
            })
            .build();
        let store: Arc<dyn CorrelationContext> = Arc::new(ThreadLocalCorrelationContext);
        let decorator = fields
            .iter()
            .fold(CorrelationScopeDecorator::builder(store).clear(), |builder, field| {
                builder.add(SingleCorrelationField::create(field.clone())).unwrap()
            })
            .build()
            .unwrap();
        let current = CurrentTraceContext::builder().add_scope_decorator(decorator).build();

        let decorated = baggage.decorate(context(3));
        for field in &fields {
            field.update_value(&decorated, Some("value"));
        }

        group.bench_with_input(BenchmarkId::new("correlated_new_scope", count), &decorated, |b, ctx| {
            b.iter(|| current.new_scope(Some(black_box(ctx))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ids, bench_scopes);
criterion_main!(benches);
