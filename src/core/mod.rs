//! Configuration and error types shared across the crate.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    BaggageConfig, BaggageFieldConfig, Config, ConfigBuilder, CorrelationConfig,
    CorrelationFieldConfig, LogLevel, LoggingConfig, ScopeConfig,
};
pub use error::{PropagationError, Result};
