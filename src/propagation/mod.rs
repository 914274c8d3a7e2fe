//! Propagated trace identity: sampling flags, contexts, extraction results and B3.

pub mod b3;
pub mod derive;
pub mod extra;
pub mod extracted;
pub mod hex;
pub mod sampling;
pub mod trace_context;
pub mod trace_id_context;

pub use b3::{B3Propagation, Getter, Setter};
pub use derive::next_context;
pub use extra::Extra;
pub use extracted::{Extracted, TraceContextOrSamplingFlags, TraceContextOrSamplingFlagsBuilder};
pub use sampling::{SamplingFlags, SamplingFlagsBuilder};
pub use trace_context::{TraceContext, TraceContextBuilder};
pub use trace_id_context::{TraceIdContext, TraceIdContextBuilder};
