//! Mirrors selected baggage fields into an external keyed store while a scope is open.
//!
//! A correlation store is typically a logging framework's per-thread context
//! map. On scope entry the decorator writes each configured field's value
//! under its store key, remembering the value it replaced. On close, every
//! key it changed is reverted. Fields configured to flush on update are also
//! written the moment their baggage value changes mid-scope.
//!
//! The store is assumed to be owned by the current worker; no locking is
//! added here.

mod config;
mod decorator;
mod flush;
mod store;
mod update_scope;

pub use config::{SingleCorrelationField, SingleCorrelationFieldBuilder};
pub use decorator::{CorrelationScopeDecorator, CorrelationScopeDecoratorBuilder, MAX_FIELDS};
pub use flush::flush;
pub use store::{MapCorrelationContext, ThreadLocalCorrelationContext};
pub use update_scope::{CorrelationUpdateScope, DirtyBits};

/// Keyed store that correlation fields are written into.
pub trait CorrelationContext: Send + Sync {
    /// Current value for `name`.
    fn get_value(&self, name: &str) -> Option<String>;

    /// Writes `value`, or removes the key for `None`. Returns false when nothing changed.
    fn update(&self, name: &str, value: Option<&str>) -> bool;
}
