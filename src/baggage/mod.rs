//! Named values propagated with a trace, and where they are stored.

pub mod builtin;
pub mod context;
pub mod field;
pub mod fields;
pub mod propagation;

pub use builtin::{builtin_by_name, constant, parent_id, sampled, span_id, trace_id};
pub use context::{BaggageContext, ContextRef, ExtraBaggageContext, ReadOnlyValue};
pub use field::BaggageField;
pub use fields::BaggageFields;
pub use propagation::{
    BaggagePropagation, BaggagePropagationBuilder, SingleBaggageField, SingleBaggageFieldBuilder,
};
