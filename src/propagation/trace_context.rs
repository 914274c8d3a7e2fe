//! Immutable span identity propagated in-process and across the wire.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::extra::Extra;
use super::hex::{parse_span_id, parse_trace_id, to_lower_hex, trace_id_string};
use super::sampling::{
    sampled_of, with_bit, with_debug, with_sampled, SamplingFlags, FLAG_DEBUG, FLAG_LOCAL_ROOT,
    FLAG_SAMPLED, FLAG_SAMPLED_LOCAL, FLAG_SAMPLED_SET, FLAG_SHARED,
};
use crate::core::{PropagationError, Result};

struct Inner {
    flags: u8,
    trace_id_high: u64,
    trace_id: u64,
    local_root_id: u64,
    parent_id: u64,
    span_id: u64,
    extra: Extra,
    trace_id_string: OnceCell<String>,
    span_id_string: OnceCell<String>,
    parent_id_string: OnceCell<String>,
    local_root_id_string: OnceCell<String>,
}

/// Identity of a span: trace id, span id, optional parent, sampling state and extra.
///
/// Cheap to clone. Equality and hashing only consider the trace id, the span
/// id and whether the span id is shared; parent id, sampling and extra do
/// not participate.
#[derive(Clone)]
pub struct TraceContext(Arc<Inner>);

impl TraceContext {
    /// Starts a new builder.
    pub fn builder() -> TraceContextBuilder {
        TraceContextBuilder::default()
    }

    /// Upper 64 bits of a 128-bit trace id, or zero.
    #[inline]
    pub fn trace_id_high(&self) -> u64 {
        self.0.trace_id_high
    }

    /// Lower 64 bits of the trace id.
    #[inline]
    pub fn trace_id(&self) -> u64 {
        self.0.trace_id
    }

    /// Span id of the root span in this process, or zero when unknown.
    #[inline]
    pub fn local_root_id(&self) -> u64 {
        self.0.local_root_id
    }

    /// True when this span started a local trace.
    #[inline]
    pub fn is_local_root(&self) -> bool {
        self.0.flags & FLAG_LOCAL_ROOT == FLAG_LOCAL_ROOT
    }

    /// Parent span id, or `None` for a root span.
    #[inline]
    pub fn parent_id(&self) -> Option<u64> {
        match self.0.parent_id {
            0 => None,
            id => Some(id),
        }
    }

    /// Parent span id, zero when absent.
    #[inline]
    pub fn parent_id_as_u64(&self) -> u64 {
        self.0.parent_id
    }

    /// Span id.
    #[inline]
    pub fn span_id(&self) -> u64 {
        self.0.span_id
    }

    /// True when the span id was created by a remote caller and is reused here.
    #[inline]
    pub fn shared(&self) -> bool {
        self.0.flags & FLAG_SHARED == FLAG_SHARED
    }

    /// Sampling decision, if made.
    #[inline]
    pub fn sampled(&self) -> Option<bool> {
        sampled_of(self.0.flags)
    }

    /// Whether the local-sampling flag is set.
    #[inline]
    pub fn sampled_local(&self) -> bool {
        self.0.flags & FLAG_SAMPLED_LOCAL == FLAG_SAMPLED_LOCAL
    }

    /// Whether the debug flag is set.
    #[inline]
    pub fn debug(&self) -> bool {
        self.0.flags & FLAG_DEBUG == FLAG_DEBUG
    }

    /// Sampling state without identity bits.
    pub fn sampling_flags(&self) -> SamplingFlags {
        SamplingFlags::from_bits(self.0.flags)
    }

    /// Extra state propagated with this context.
    pub fn extra(&self) -> &Extra {
        &self.0.extra
    }

    /// Returns the extra instance whose concrete type is exactly `T`.
    pub fn find_extra<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.extra.get::<T>()
    }

    /// Trace id as 16 or 32 lower-hex characters.
    pub fn trace_id_string(&self) -> &str {
        self.0
            .trace_id_string
            .get_or_init(|| trace_id_string(self.0.trace_id_high, self.0.trace_id))
    }

    /// Span id as 16 lower-hex characters.
    pub fn span_id_string(&self) -> &str {
        self.0.span_id_string.get_or_init(|| to_lower_hex(self.0.span_id))
    }

    /// Parent id as lower-hex, if any.
    pub fn parent_id_string(&self) -> Option<&str> {
        if self.0.parent_id == 0 {
            return None;
        }
        Some(self.0.parent_id_string.get_or_init(|| to_lower_hex(self.0.parent_id)))
    }

    /// Local root id as lower-hex, if any.
    pub fn local_root_id_string(&self) -> Option<&str> {
        if self.0.local_root_id == 0 {
            return None;
        }
        Some(
            self.0
                .local_root_id_string
                .get_or_init(|| to_lower_hex(self.0.local_root_id)),
        )
    }

    /// Builder seeded with every field of this context, extra included.
    pub fn to_builder(&self) -> TraceContextBuilder {
        TraceContextBuilder {
            flags: self.0.flags,
            trace_id_high: self.0.trace_id_high,
            trace_id: self.0.trace_id,
            local_root_id: self.0.local_root_id,
            parent_id: self.0.parent_id,
            span_id: self.0.span_id,
            extra: self.0.extra.clone(),
        }
    }

    /// A distinct instance with the same fields, so identity-based caches treat it as new.
    #[must_use]
    pub fn shallow_copy(&self) -> TraceContext {
        self.derive(self.0.flags, self.0.extra.clone())
    }

    /// Same identity with a different extra registry.
    #[must_use]
    pub fn with_extra(&self, extra: Extra) -> TraceContext {
        if extra == self.0.extra {
            return self.clone();
        }
        self.derive(self.0.flags, extra)
    }

    pub(crate) fn flags(&self) -> u8 {
        self.0.flags
    }

    /// Same identity with different flag bits. Hex caches carry over.
    pub(crate) fn with_flags(&self, flags: u8) -> TraceContext {
        if flags == self.0.flags {
            return self.clone();
        }
        self.derive(flags, self.0.extra.clone())
    }

    pub(crate) fn ptr_eq(&self, other: &TraceContext) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn derive(&self, flags: u8, extra: Extra) -> TraceContext {
        TraceContext(Arc::new(Inner {
            flags,
            trace_id_high: self.0.trace_id_high,
            trace_id: self.0.trace_id,
            local_root_id: self.0.local_root_id,
            parent_id: self.0.parent_id,
            span_id: self.0.span_id,
            extra,
            trace_id_string: self.0.trace_id_string.clone(),
            span_id_string: self.0.span_id_string.clone(),
            parent_id_string: self.0.parent_id_string.clone(),
            local_root_id_string: self.0.local_root_id_string.clone(),
        }))
    }
}

impl PartialEq for TraceContext {
    fn eq(&self, other: &Self) -> bool {
        self.0.trace_id_high == other.0.trace_id_high
            && self.0.trace_id == other.0.trace_id
            && self.0.span_id == other.0.span_id
            && self.shared() == other.shared()
    }
}

impl Eq for TraceContext {}

impl Hash for TraceContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.trace_id_high.hash(state);
        self.0.trace_id.hash(state);
        self.0.span_id.hash(state);
        self.shared().hash(state);
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.trace_id_string(), self.span_id_string())
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("TraceContext");
        s.field("trace_id", &self.trace_id_string())
            .field("span_id", &self.span_id_string());
        if let Some(parent_id) = self.parent_id_string() {
            s.field("parent_id", &parent_id);
        }
        s.field("flags", &self.sampling_flags());
        if self.shared() {
            s.field("shared", &true);
        }
        if !self.0.extra.is_empty() {
            s.field("extra", &self.0.extra);
        }
        s.finish()
    }
}

/// Builder for [`TraceContext`].
///
/// Setters consume and return the builder. The `parse_*` methods mutate in
/// place and report success, so a caller can stop at the first bad header.
#[derive(Clone, Default)]
pub struct TraceContextBuilder {
    flags: u8,
    trace_id_high: u64,
    trace_id: u64,
    local_root_id: u64,
    parent_id: u64,
    span_id: u64,
    extra: Extra,
}

impl TraceContextBuilder {
    /// Upper 64 bits of a 128-bit trace id.
    pub fn trace_id_high(mut self, trace_id_high: u64) -> Self {
        self.trace_id_high = trace_id_high;
        self
    }

    /// Lower 64 bits of the trace id.
    pub fn trace_id(mut self, trace_id: u64) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Zero clears the parent.
    pub fn parent_id(mut self, parent_id: u64) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Span id, must be non-zero.
    pub fn span_id(mut self, span_id: u64) -> Self {
        self.span_id = span_id;
        self
    }

    /// Sets the decision; `None` defers it downstream.
    pub fn sampled(mut self, sampled: impl Into<Option<bool>>) -> Self {
        self.flags = match sampled.into() {
            Some(sampled) => with_sampled(self.flags, sampled),
            None => self.flags & !(FLAG_SAMPLED_SET | FLAG_SAMPLED | FLAG_DEBUG),
        };
        self
    }

    /// Setting debug to true also sets sampled to true.
    pub fn debug(mut self, debug: bool) -> Self {
        self.flags = with_debug(self.flags, debug);
        self
    }

    /// Sets the local-sampling flag.
    pub fn sampled_local(mut self, sampled_local: bool) -> Self {
        self.flags = with_bit(self.flags, FLAG_SAMPLED_LOCAL, sampled_local);
        self
    }

    /// Marks the span as shared with the caller.
    pub fn shared(mut self, shared: bool) -> Self {
        self.flags = with_bit(self.flags, FLAG_SHARED, shared);
        self
    }

    /// Drops all extra state.
    pub fn clear_extra(mut self) -> Self {
        self.extra = Extra::EMPTY;
        self
    }

    /// Adds an extra instance, replacing any earlier instance of the same type.
    pub fn add_extra<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.extra = self.extra.with(value);
        self
    }

    /// Merges a whole registry into the builder's extra.
    pub fn extra(mut self, extra: &Extra) -> Self {
        self.extra = self.extra.merge(extra);
        self
    }

    pub(crate) fn local_root_id(mut self, local_root_id: u64) -> Self {
        self.local_root_id = local_root_id;
        self
    }

    pub(crate) fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Parses a 1-32 character lower-hex trace id read from `key`.
    pub fn parse_trace_id(&mut self, value: Option<&str>, key: &str) -> bool {
        let Some(value) = value else {
            tracing::debug!(key, "trace id is missing");
            return false;
        };
        if !valid_length(value, 32) {
            tracing::debug!(key, value, "trace id should be 1 to 32 characters");
            return false;
        }
        match parse_trace_id(value) {
            Some((high, low)) => {
                self.trace_id_high = high;
                self.trace_id = low;
                true
            }
            None => {
                tracing::debug!(key, value, "trace id should be lower-hex and not all zeros");
                false
            }
        }
    }

    /// Parses a 1-16 character lower-hex span id read from `key`.
    pub fn parse_span_id(&mut self, value: Option<&str>, key: &str) -> bool {
        let Some(value) = value else {
            tracing::debug!(key, "span id is missing");
            return false;
        };
        match parse_id(value, key, "span id") {
            Some(id) => {
                self.span_id = id;
                true
            }
            None => false,
        }
    }

    /// Parses an optional parent id read from `key`. An absent parent is valid.
    pub fn parse_parent_id(&mut self, value: Option<&str>, key: &str) -> bool {
        let Some(value) = value else {
            return true;
        };
        match parse_id(value, key, "parent id") {
            Some(id) => {
                self.parent_id = id;
                true
            }
            None => false,
        }
    }

    /// Validates identity and freezes the context.
    pub fn build(self) -> Result<TraceContext> {
        let mut missing = String::new();
        if self.trace_id_high == 0 && self.trace_id == 0 {
            missing.push_str(" traceId");
        }
        if self.span_id == 0 {
            missing.push_str(" spanId");
        }
        if !missing.is_empty() {
            return Err(PropagationError::MissingIdentifier(format!("Missing:{missing}")));
        }
        Ok(self.assemble())
    }

    /// Freezes without validation. Callers guarantee non-zero ids.
    pub(crate) fn assemble(self) -> TraceContext {
        let is_local_root = self.local_root_id != 0 && self.local_root_id == self.span_id;
        TraceContext(Arc::new(Inner {
            flags: with_bit(self.flags, FLAG_LOCAL_ROOT, is_local_root),
            trace_id_high: self.trace_id_high,
            trace_id: self.trace_id,
            local_root_id: self.local_root_id,
            parent_id: self.parent_id,
            span_id: self.span_id,
            extra: self.extra,
            trace_id_string: OnceCell::new(),
            span_id_string: OnceCell::new(),
            parent_id_string: OnceCell::new(),
            local_root_id_string: OnceCell::new(),
        }))
    }
}

fn valid_length(value: &str, max: usize) -> bool {
    !value.is_empty() && value.len() <= max
}

fn parse_id(value: &str, key: &str, what: &str) -> Option<u64> {
    if !valid_length(value, 16) {
        tracing::debug!(key, value, "{what} should be 1 to 16 characters");
        return None;
    }
    let id = parse_span_id(value);
    if id.is_none() {
        tracing::debug!(key, value, "{what} should be lower-hex and not all zeros");
    }
    id
}
