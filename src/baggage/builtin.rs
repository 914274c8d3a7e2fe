//! Read-only fields derived from the context itself.
//!
//! These are usable anywhere a [`BaggageField`] is, most often as
//! correlation fields, but are never part of a context's container.

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::context::ReadOnlyValue;
use super::field::BaggageField;
use crate::core::Result;

/// Names of the built-in fields.
pub const BUILTIN_NAMES: [&str; 4] = ["traceId", "parentId", "spanId", "sampled"];

static TRACE_ID: Lazy<BaggageField> = Lazy::new(|| builtin("traceId", ReadOnlyValue::TraceId));
static PARENT_ID: Lazy<BaggageField> = Lazy::new(|| builtin("parentId", ReadOnlyValue::ParentId));
static SPAN_ID: Lazy<BaggageField> = Lazy::new(|| builtin("spanId", ReadOnlyValue::SpanId));
static SAMPLED: Lazy<BaggageField> = Lazy::new(|| builtin("sampled", ReadOnlyValue::Sampled));

fn builtin(name: &'static str, value: ReadOnlyValue) -> BaggageField {
    BaggageField::from_parts(name.to_string(), Arc::new(value))
}

/// Trace id as 16 or 32 lower-hex characters.
pub fn trace_id() -> BaggageField {
    TRACE_ID.clone()
}

/// Parent span id, absent for root spans.
pub fn parent_id() -> BaggageField {
    PARENT_ID.clone()
}

/// Span id of the current context, lower-hex.
pub fn span_id() -> BaggageField {
    SPAN_ID.clone()
}

/// `"true"` or `"false"`, absent when the decision is deferred.
pub fn sampled() -> BaggageField {
    SAMPLED.clone()
}

/// A field whose value is fixed, such as a deployment region.
pub fn constant(name: &str, value: &str) -> Result<BaggageField> {
    BaggageField::with_context(name, Arc::new(ReadOnlyValue::Constant(value.to_string())))
}

/// Built-in field by name, case-insensitively.
pub fn builtin_by_name(name: &str) -> Option<BaggageField> {
    let lc_name = name.trim().to_lowercase();
    [trace_id(), parent_id(), span_id(), sampled()]
        .into_iter()
        .find(|field| field.lc_name() == lc_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::{SamplingFlags, TraceContext, TraceContextOrSamplingFlags};

    #[test]
    fn test_values_from_context() {
        let context = TraceContext::builder()
            .trace_id(0xa)
            .parent_id(0xb)
            .span_id(0xc)
            .sampled(true)
            .build()
            .unwrap();
        assert_eq!(trace_id().get_value(&context).as_deref(), Some("000000000000000a"));
        assert_eq!(parent_id().get_value(&context).as_deref(), Some("000000000000000b"));
        assert_eq!(span_id().get_value(&context).as_deref(), Some("000000000000000c"));
        assert_eq!(sampled().get_value(&context).as_deref(), Some("true"));
    }

    #[test]
    fn test_read_only() {
        let context = TraceContext::builder().trace_id(1).span_id(2).build().unwrap();
        assert!(trace_id().is_read_only());
        assert!(!trace_id().update_value(&context, Some("ff")));
        assert_eq!(parent_id().get_value(&context), None);
    }

    #[test]
    fn test_sampled_from_flags_only() {
        let extracted = TraceContextOrSamplingFlags::from_flags(SamplingFlags::NOT_SAMPLED);
        assert_eq!(sampled().get_value(&extracted).as_deref(), Some("false"));
        assert_eq!(span_id().get_value(&extracted), None);
    }

    #[test]
    fn test_constant() {
        let region = constant("region", "us-east-1").unwrap();
        let context = TraceContext::builder().trace_id(1).span_id(2).build().unwrap();
        assert_eq!(region.get_value(&context).as_deref(), Some("us-east-1"));
        assert!(constant(" ", "x").is_err());
    }

    #[test]
    fn test_builtin_by_name() {
        assert_eq!(builtin_by_name("TRACEID"), Some(trace_id()));
        assert_eq!(builtin_by_name("userId"), None);
    }
}
