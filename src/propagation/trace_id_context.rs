//! Trace identity without a span id, as extracted from formats that omit it.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::hex::trace_id_string;
use super::sampling::{sampled_of, with_debug, with_sampled, SamplingFlags, FLAG_DEBUG};
use crate::core::{PropagationError, Result};

/// Trace id plus sampling state. Equality only considers the trace id.
#[derive(Clone, Copy)]
pub struct TraceIdContext {
    flags: u8,
    trace_id_high: u64,
    trace_id: u64,
}

impl TraceIdContext {
    /// Starts an empty builder.
    pub fn builder() -> TraceIdContextBuilder {
        TraceIdContextBuilder::default()
    }

    /// Upper 64 bits, zero for 64-bit ids.
    pub fn trace_id_high(&self) -> u64 {
        self.trace_id_high
    }

    /// Lower 64 bits.
    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// Sampling decision, if made.
    pub fn sampled(&self) -> Option<bool> {
        sampled_of(self.flags)
    }

    /// Whether the debug flag is set.
    pub fn debug(&self) -> bool {
        self.flags & FLAG_DEBUG == FLAG_DEBUG
    }

    /// Sampling flags.
    pub fn sampling_flags(&self) -> SamplingFlags {
        SamplingFlags::from_bits(self.flags)
    }

    /// Trace id as 16 or 32 lower-hex characters.
    pub fn trace_id_string(&self) -> String {
        trace_id_string(self.trace_id_high, self.trace_id)
    }

    pub(crate) fn flags(&self) -> u8 {
        self.flags
    }

    pub(crate) fn with_flags(self, flags: u8) -> Self {
        Self { flags, ..self }
    }
}

impl PartialEq for TraceIdContext {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id_high == other.trace_id_high && self.trace_id == other.trace_id
    }
}

impl Eq for TraceIdContext {}

impl Hash for TraceIdContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trace_id_high.hash(state);
        self.trace_id.hash(state);
    }
}

impl fmt::Display for TraceIdContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace_id_string())
    }
}

impl fmt::Debug for TraceIdContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceIdContext")
            .field("trace_id", &self.trace_id_string())
            .field("flags", &self.sampling_flags())
            .finish()
    }
}

/// Builder for [`TraceIdContext`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceIdContextBuilder {
    flags: u8,
    trace_id_high: u64,
    trace_id: u64,
}

impl TraceIdContextBuilder {
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

    /// Sets the sampling decision.
    pub fn sampled(mut self, sampled: bool) -> Self {
        self.flags = with_sampled(self.flags, sampled);
        self
    }

    /// Sets the debug flag.
    pub fn debug(mut self, debug: bool) -> Self {
        self.flags = with_debug(self.flags, debug);
        self
    }

    /// Fails when the trace id is zero.
    pub fn build(self) -> Result<TraceIdContext> {
        if self.trace_id_high == 0 && self.trace_id == 0 {
            return Err(PropagationError::MissingIdentifier("Missing: traceId".to_string()));
        }
        Ok(TraceIdContext {
            flags: self.flags,
            trace_id_high: self.trace_id_high,
            trace_id: self.trace_id,
        })
    }
}
