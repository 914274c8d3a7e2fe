//! Derives the context a unit of work runs under from what was extracted.

use rand::Rng;

use super::extracted::{Extracted, TraceContextOrSamplingFlags};
use super::sampling::{FLAG_DEBUG, FLAG_SAMPLED, FLAG_SAMPLED_LOCAL, FLAG_SAMPLED_SET};
use super::trace_context::TraceContext;

const INHERITED_FLAGS: u8 = FLAG_SAMPLED | FLAG_SAMPLED_SET | FLAG_DEBUG | FLAG_SAMPLED_LOCAL;

/// Random non-zero 64-bit id.
pub fn next_id<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    loop {
        let id: u64 = rng.gen();
        if id != 0 {
            return id;
        }
    }
}

/// New context for local work.
///
/// A full context yields a child in the same trace, a trace-id-only context
/// yields a root span in that trace, and bare sampling flags start a new
/// trace. Sampling state and extra carry over. The new span is the local
/// root unless the parent already has one in this process.
pub fn next_context(extracted: &TraceContextOrSamplingFlags) -> TraceContext {
    let mut rng = rand::thread_rng();
    let span_id = next_id(&mut rng);

    let builder = match extracted.value() {
        Extracted::Context(parent) => {
            let local_root_id = match parent.local_root_id() {
                0 => span_id,
                id => id,
            };
            TraceContext::builder()
                .trace_id_high(parent.trace_id_high())
                .trace_id(parent.trace_id())
                .parent_id(parent.span_id())
                .flags(parent.flags() & INHERITED_FLAGS)
                .local_root_id(local_root_id)
                .extra(parent.extra())
        }
        Extracted::TraceIdContext(trace) => TraceContext::builder()
            .trace_id_high(trace.trace_id_high())
            .trace_id(trace.trace_id())
            .flags(trace.flags() & INHERITED_FLAGS)
            .local_root_id(span_id)
            .extra(extracted.extra()),
        Extracted::SamplingFlags(flags) => TraceContext::builder()
            .trace_id(span_id)
            .flags(flags.bits() & INHERITED_FLAGS)
            .local_root_id(span_id)
            .extra(extracted.extra()),
    };

    let context = builder.span_id(span_id).assemble();
    tracing::trace!(%context, parent = ?context.parent_id_string(), "derived context");
    context
}
