//! Urpo propagation - trace context propagation and log correlation.
//!
//! Carries trace identity, sampling decisions and baggage across process
//! boundaries using B3 headers, keeps a per-thread "current" context while a
//! unit of work runs, and mirrors selected fields into a logging framework's
//! keyed context so every log line carries the active trace.
//!
//! # Architecture
//!
//! - `propagation`: trace identifiers, sampling flags, extraction results and B3
//! - `baggage`: named fields stored per context and propagated alongside B3
//! - `current`: the scope manager and its decorators
//! - `correlation`: the decorator mirroring fields into a correlation store
//! - `request`: per-request glue for a web layer's interceptor
//! - `core`: configuration and errors
//! - `cli`: the `urpo-ctx` command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use urpo_propagation::core::ConfigBuilder;
//! use urpo_propagation::correlation::ThreadLocalCorrelationContext;
//! use urpo_propagation::Application;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new().remote_field("userId", &[]).build()?;
//!     let app = Application::new(config, Arc::new(ThreadLocalCorrelationContext))?;
//!
//!     let mut headers = HashMap::new();
//!     headers.insert("b3".to_string(), "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-1".to_string());
//!     let request = app.start_request(&app.extract(&headers));
//!     println!("{:?}", ThreadLocalCorrelationContext::snapshot());
//!     drop(request);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod application;
pub mod baggage;
pub mod cli;
pub mod core;
pub mod correlation;
pub mod current;
pub mod propagation;
pub mod request;

// Re-export core types for convenience
pub use crate::application::Application;
pub use crate::baggage::{BaggageField, BaggagePropagation};
pub use crate::core::{Config, PropagationError, Result};
pub use crate::correlation::{CorrelationContext, CorrelationScopeDecorator};
pub use crate::current::{CurrentScope, CurrentTraceContext};
pub use crate::propagation::{SamplingFlags, TraceContext, TraceContextOrSamplingFlags};
pub use crate::request::RequestScope;
