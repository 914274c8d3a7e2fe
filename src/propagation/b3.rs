//! B3 header propagation, multi-header and single-header forms.
//!
//! Extraction prefers the single `b3` header when present and falls back to
//! the `x-b3-*` family. Anything malformed degrades to
//! [`TraceContextOrSamplingFlags::EMPTY`] with a debug diagnostic; inbound
//! data never produces an error. Injection always writes the multi-header
//! form.

use std::collections::HashMap;

use super::extracted::TraceContextOrSamplingFlags;
use super::sampling::SamplingFlags;
use super::trace_context::{TraceContext, TraceContextBuilder};

/// Multi-header trace id
pub const TRACE_ID: &str = "x-b3-traceid";
/// Multi-header span id
pub const SPAN_ID: &str = "x-b3-spanid";
/// Multi-header parent span id
pub const PARENT_SPAN_ID: &str = "x-b3-parentspanid";
/// Multi-header sampling decision
pub const SAMPLED: &str = "x-b3-sampled";
/// Multi-header debug flag
pub const FLAGS: &str = "x-b3-flags";
/// Single-header form
pub const SINGLE: &str = "b3";

/// Reads propagated fields from an inbound carrier.
pub trait Getter {
    /// Value for `key`, if present.
    fn get(&self, key: &str) -> Option<&str>;
}

/// Writes propagated fields into an outbound carrier.
pub trait Setter {
    /// Sets `key` to `value`.
    fn put(&mut self, key: &str, value: &str);
}

impl Getter for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl Setter for HashMap<String, String> {
    fn put(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }
}

/// Stateless B3 codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct B3Propagation;

impl B3Propagation {
    /// Header names this codec reads.
    pub fn keys(&self) -> &'static [&'static str] {
        &[SINGLE, TRACE_ID, SPAN_ID, PARENT_SPAN_ID, SAMPLED, FLAGS]
    }

    /// Reads B3 state from `carrier`, preferring the single header.
    pub fn extract<G: Getter + ?Sized>(&self, carrier: &G) -> TraceContextOrSamplingFlags {
        match carrier.get(SINGLE) {
            Some(single) => extract_single(single),
            None => extract_multi(carrier),
        }
    }

    /// Writes `context` into `carrier` as multi-header B3.
    pub fn inject<S: Setter + ?Sized>(&self, context: &TraceContext, carrier: &mut S) {
        carrier.put(TRACE_ID, context.trace_id_string());
        carrier.put(SPAN_ID, context.span_id_string());
        if let Some(parent_id) = context.parent_id_string() {
            carrier.put(PARENT_SPAN_ID, parent_id);
        }
        if context.debug() {
            carrier.put(FLAGS, "1");
        } else if let Some(sampled) = context.sampled() {
            carrier.put(SAMPLED, if sampled { "1" } else { "0" });
        }
    }
}

fn extract_multi<G: Getter + ?Sized>(carrier: &G) -> TraceContextOrSamplingFlags {
    let debug = carrier.get(FLAGS) == Some("1");
    let sampled = match carrier.get(SAMPLED) {
        None => None,
        Some("1" | "true") => Some(true),
        Some("0" | "false") => Some(false),
        Some(other) => {
            tracing::debug!(key = SAMPLED, value = other, "ignoring unrecognized sampled value");
            None
        }
    };

    if carrier.get(TRACE_ID).is_none() {
        let flags = if debug {
            SamplingFlags::DEBUG
        } else {
            SamplingFlags::from_sampled(sampled)
        };
        return TraceContextOrSamplingFlags::from_flags(flags);
    }

    let mut builder = TraceContext::builder();
    if !builder.parse_trace_id(carrier.get(TRACE_ID), TRACE_ID)
        || !builder.parse_span_id(carrier.get(SPAN_ID), SPAN_ID)
        || !builder.parse_parent_id(carrier.get(PARENT_SPAN_ID), PARENT_SPAN_ID)
    {
        return TraceContextOrSamplingFlags::EMPTY;
    }
    finish(builder.sampled(sampled).debug(debug))
}

fn extract_single(value: &str) -> TraceContextOrSamplingFlags {
    if value.is_empty() {
        tracing::debug!(key = SINGLE, "empty b3 header");
        return TraceContextOrSamplingFlags::EMPTY;
    }

    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() == 1 {
        return match parse_sampling(parts[0]) {
            Some(flags) => TraceContextOrSamplingFlags::from_flags(flags),
            None => TraceContextOrSamplingFlags::EMPTY,
        };
    }
    if parts.len() > 4 {
        tracing::debug!(key = SINGLE, value, "too many fields in b3 header");
        return TraceContextOrSamplingFlags::EMPTY;
    }

    let mut builder = TraceContext::builder();
    if !builder.parse_trace_id(Some(parts[0]), SINGLE) || !builder.parse_span_id(Some(parts[1]), SINGLE) {
        return TraceContextOrSamplingFlags::EMPTY;
    }
    if let Some(state) = parts.get(2) {
        let Some(flags) = parse_sampling(state) else {
            return TraceContextOrSamplingFlags::EMPTY;
        };
        builder = builder.sampled(flags.sampled()).debug(flags.debug());
    }
    if !builder.parse_parent_id(parts.get(3).copied(), SINGLE) {
        return TraceContextOrSamplingFlags::EMPTY;
    }
    finish(builder)
}

fn parse_sampling(state: &str) -> Option<SamplingFlags> {
    match state {
        "0" => Some(SamplingFlags::NOT_SAMPLED),
        "1" => Some(SamplingFlags::SAMPLED),
        "d" => Some(SamplingFlags::DEBUG),
        other => {
            tracing::debug!(key = SINGLE, value = other, "invalid sampling state in b3 header");
            None
        }
    }
}

fn finish(builder: TraceContextBuilder) -> TraceContextOrSamplingFlags {
    match builder.build() {
        Ok(context) => TraceContextOrSamplingFlags::from_context(context),
        Err(e) => {
            tracing::debug!(error = %e, "discarding incomplete b3 context");
            TraceContextOrSamplingFlags::EMPTY
        }
    }
}
