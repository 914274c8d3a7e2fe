//! Result of extracting trace state from an inbound carrier.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::extra::Extra;
use super::sampling::{with_sampled, SamplingFlags, FLAG_SAMPLED_LOCAL};
use super::trace_context::TraceContext;
use super::trace_id_context::TraceIdContext;

/// What the carrier held: a full context, a trace id only, or just a sampling decision.
#[derive(Clone, Debug, PartialEq)]
pub enum Extracted {
    /// Trace and span ids
    Context(TraceContext),
    /// Trace id without a span
    TraceIdContext(TraceIdContext),
    /// Sampling decision only
    SamplingFlags(SamplingFlags),
}

/// Union of extraction outcomes plus extra state gathered on the way.
///
/// When the value is a full [`TraceContext`], extra lives on the context
/// itself and [`extra`](Self::extra) is empty.
#[derive(Clone, PartialEq)]
pub struct TraceContextOrSamplingFlags {
    value: Extracted,
    extra: Extra,
}

impl TraceContextOrSamplingFlags {
    /// Nothing extracted
    pub const EMPTY: Self = Self::flags_only(SamplingFlags::EMPTY);
    /// Only a "don't sample" decision
    pub const NOT_SAMPLED: Self = Self::flags_only(SamplingFlags::NOT_SAMPLED);
    /// Only a "sample" decision
    pub const SAMPLED: Self = Self::flags_only(SamplingFlags::SAMPLED);
    /// Only a debug decision
    pub const DEBUG: Self = Self::flags_only(SamplingFlags::DEBUG);

    const fn flags_only(flags: SamplingFlags) -> Self {
        Self {
            value: Extracted::SamplingFlags(flags),
            extra: Extra::EMPTY,
        }
    }

    /// Wraps a full context.
    pub fn from_context(context: TraceContext) -> Self {
        Self {
            value: Extracted::Context(context),
            extra: Extra::EMPTY,
        }
    }

    /// Wraps a trace id context.
    pub fn from_trace_id_context(context: TraceIdContext) -> Self {
        Self {
            value: Extracted::TraceIdContext(context),
            extra: Extra::EMPTY,
        }
    }

    /// Reuses the canonical constants where one matches.
    pub fn from_flags(flags: SamplingFlags) -> Self {
        match flags {
            SamplingFlags::EMPTY => Self::EMPTY,
            SamplingFlags::NOT_SAMPLED => Self::NOT_SAMPLED,
            SamplingFlags::SAMPLED => Self::SAMPLED,
            SamplingFlags::DEBUG => Self::DEBUG,
            other => Self::flags_only(other),
        }
    }

    /// Starts a builder around an extracted value.
    pub fn builder(value: Extracted) -> TraceContextOrSamplingFlagsBuilder {
        TraceContextOrSamplingFlagsBuilder {
            value,
            extra: Extra::EMPTY,
            sampled_local: false,
        }
    }

    /// Builder seeded with this value and its extra.
    pub fn to_builder(&self) -> TraceContextOrSamplingFlagsBuilder {
        TraceContextOrSamplingFlagsBuilder {
            value: self.value.clone(),
            extra: self.extra.clone(),
            sampled_local: false,
        }
    }

    /// The extracted value.
    pub fn value(&self) -> &Extracted {
        &self.value
    }

    /// The full context, if one was extracted.
    pub fn context(&self) -> Option<&TraceContext> {
        match &self.value {
            Extracted::Context(context) => Some(context),
            _ => None,
        }
    }

    /// The trace id context, if that was extracted.
    pub fn trace_id_context(&self) -> Option<&TraceIdContext> {
        match &self.value {
            Extracted::TraceIdContext(context) => Some(context),
            _ => None,
        }
    }

    /// Flags when only a sampling decision was extracted.
    pub fn sampling_flags(&self) -> Option<SamplingFlags> {
        match &self.value {
            Extracted::SamplingFlags(flags) => Some(*flags),
            _ => None,
        }
    }

    /// Extra gathered outside a full context.
    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    /// Extra wherever it lives: on the context for the context variant, otherwise alongside.
    pub fn effective_extra(&self) -> &Extra {
        match &self.value {
            Extracted::Context(context) => context.extra(),
            _ => &self.extra,
        }
    }

    /// Exact-type lookup over [`effective_extra`](Self::effective_extra).
    pub fn find_extra<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.effective_extra().get::<T>()
    }

    /// Sampling decision of whichever value was extracted.
    pub fn sampled(&self) -> Option<bool> {
        match &self.value {
            Extracted::Context(context) => context.sampled(),
            Extracted::TraceIdContext(context) => context.sampled(),
            Extracted::SamplingFlags(flags) => flags.sampled(),
        }
    }

    /// Whether the local-sampling flag is set.
    pub fn sampled_local(&self) -> bool {
        self.flags() & FLAG_SAMPLED_LOCAL == FLAG_SAMPLED_LOCAL
    }

    /// Applies a sampling decision, returning `self` when it already holds.
    #[must_use]
    pub fn with_sampled(self, sampled: bool) -> Self {
        if self.sampled() == Some(sampled) {
            return self;
        }
        let flags = with_sampled(self.flags(), sampled);
        self.with_flags(flags)
    }

    fn flags(&self) -> u8 {
        match &self.value {
            Extracted::Context(context) => context.flags(),
            Extracted::TraceIdContext(context) => context.flags(),
            Extracted::SamplingFlags(flags) => flags.bits(),
        }
    }

    fn with_flags(self, flags: u8) -> Self {
        let value = match self.value {
            Extracted::Context(context) => Extracted::Context(context.with_flags(flags)),
            Extracted::TraceIdContext(context) => {
                Extracted::TraceIdContext(context.with_flags(flags))
            }
            Extracted::SamplingFlags(_) => {
                return Self {
                    extra: self.extra,
                    ..Self::from_flags(SamplingFlags::from_bits(flags))
                }
            }
        };
        Self {
            value,
            extra: self.extra,
        }
    }
}

impl From<TraceContext> for TraceContextOrSamplingFlags {
    fn from(context: TraceContext) -> Self {
        Self::from_context(context)
    }
}

impl From<TraceIdContext> for TraceContextOrSamplingFlags {
    fn from(context: TraceIdContext) -> Self {
        Self::from_trace_id_context(context)
    }
}

impl From<SamplingFlags> for TraceContextOrSamplingFlags {
    fn from(flags: SamplingFlags) -> Self {
        Self::from_flags(flags)
    }
}

impl fmt::Debug for TraceContextOrSamplingFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("TraceContextOrSamplingFlags");
        match &self.value {
            Extracted::Context(context) => s.field("context", context),
            Extracted::TraceIdContext(context) => s.field("trace_id_context", context),
            Extracted::SamplingFlags(flags) => s.field("sampling_flags", flags),
        };
        if !self.extra.is_empty() {
            s.field("extra", &self.extra);
        }
        s.finish()
    }
}

/// Builder that keeps extra on the context when there is one.
#[derive(Clone, Debug)]
pub struct TraceContextOrSamplingFlagsBuilder {
    value: Extracted,
    extra: Extra,
    sampled_local: bool,
}

impl TraceContextOrSamplingFlagsBuilder {
    /// Replaces the value with a full context.
    pub fn context(mut self, context: TraceContext) -> Self {
        self.value = Extracted::Context(context);
        self
    }

    /// Replaces the value with a trace id context.
    pub fn trace_id_context(mut self, context: TraceIdContext) -> Self {
        self.value = Extracted::TraceIdContext(context);
        self
    }

    /// Replaces the value with sampling flags.
    pub fn sampling_flags(mut self, flags: SamplingFlags) -> Self {
        self.value = Extracted::SamplingFlags(flags);
        self
    }

    /// Records this trace locally regardless of the remote decision.
    pub fn sampled_local(mut self) -> Self {
        self.sampled_local = true;
        self
    }

    /// Attaches extra state.
    pub fn add_extra<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        self.extra = self.extra.with(value);
        self
    }

    /// Attaches everything in `extra`.
    pub fn extra(mut self, extra: &Extra) -> Self {
        self.extra = self.extra.merge(extra);
        self
    }

    /// Finishes the result.
    pub fn build(self) -> TraceContextOrSamplingFlags {
        let local = if self.sampled_local { FLAG_SAMPLED_LOCAL } else { 0 };
        let result = match self.value {
            Extracted::Context(context) => {
                let context = if self.extra.is_empty() {
                    context
                } else {
                    context.with_extra(context.extra().merge(&self.extra))
                };
                let flags = context.flags() | local;
                return TraceContextOrSamplingFlags::from_context(context.with_flags(flags));
            }
            Extracted::TraceIdContext(context) => {
                let flags = context.flags() | local;
                TraceContextOrSamplingFlags::from_trace_id_context(context.with_flags(flags))
            }
            Extracted::SamplingFlags(flags) => {
                TraceContextOrSamplingFlags::from_flags(SamplingFlags::from_bits(flags.bits() | local))
            }
        };
        TraceContextOrSamplingFlags {
            extra: self.extra,
            ..result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn context() -> TraceContext {
        TraceContext::builder().trace_id(1).span_id(2).build().unwrap()
    }

    #[test]
    fn test_exactly_one_variant() {
        let extracted = TraceContextOrSamplingFlags::from_context(context());
        assert!(extracted.context().is_some());
        assert!(extracted.trace_id_context().is_none());
        assert!(extracted.sampling_flags().is_none());

        let extracted = TraceContextOrSamplingFlags::EMPTY;
        assert_eq!(extracted.sampling_flags(), Some(SamplingFlags::EMPTY));
        assert!(extracted.context().is_none());
    }

    #[test]
    fn test_from_flags_reuses_constants() {
        assert_eq!(
            TraceContextOrSamplingFlags::from_flags(SamplingFlags::SAMPLED),
            TraceContextOrSamplingFlags::SAMPLED
        );
    }

    #[test]
    fn test_with_sampled_unchanged_returns_self() {
        let extracted = TraceContextOrSamplingFlags::SAMPLED.with_sampled(true);
        assert_eq!(extracted, TraceContextOrSamplingFlags::SAMPLED);

        let extracted = TraceContextOrSamplingFlags::DEBUG.with_sampled(false);
        assert_eq!(extracted, TraceContextOrSamplingFlags::NOT_SAMPLED);
    }

    #[test]
    fn test_with_sampled_on_context() {
        let extracted = TraceContextOrSamplingFlags::from_context(context()).with_sampled(false);
        assert_eq!(extracted.sampled(), Some(false));
        assert_eq!(extracted.context(), Some(&context()));
    }

    #[test]
    fn test_builder_migrates_extra_onto_context() {
        let extracted = TraceContextOrSamplingFlags::builder(Extracted::Context(context()))
            .add_extra(Arc::new(42u64))
            .build();
        assert!(extracted.extra().is_empty());
        let on_context = extracted.context().unwrap().find_extra::<u64>();
        assert_eq!(on_context.as_deref(), Some(&42));
        assert_eq!(extracted.find_extra::<u64>().as_deref(), Some(&42));
    }

    #[test]
    fn test_builder_keeps_extra_beside_flags() {
        let extracted = TraceContextOrSamplingFlags::builder(Extracted::SamplingFlags(SamplingFlags::EMPTY))
            .add_extra(Arc::new(7u64))
            .build();
        assert_eq!(extracted.extra().len(), 1);
        assert_eq!(extracted.find_extra::<u64>().as_deref(), Some(&7));
    }

    #[test]
    fn test_builder_sampled_local() {
        let extracted = TraceContextOrSamplingFlags::builder(Extracted::SamplingFlags(SamplingFlags::NOT_SAMPLED))
            .sampled_local()
            .build();
        assert!(extracted.sampled_local());
        assert_eq!(extracted.sampled(), Some(false));
    }
}
