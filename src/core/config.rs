//! Configuration management for propagation and log correlation.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Programmatic construction through [`ConfigBuilder`]
//! - Validation and defaults
//!
//! Validation catches every mistake that would otherwise surface when the
//! baggage propagation or correlation decorator is assembled, so a bad file
//! fails at startup with a message naming the offending entry.

use crate::baggage::builtin::BUILTIN_NAMES;
use crate::core::{PropagationError, Result};
use crate::correlation::MAX_FIELDS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Baggage fields and constants
    pub baggage: BaggageConfig,
    /// Correlation store mapping
    pub correlation: CorrelationConfig,
    /// Scope manager settings
    pub scope: ScopeConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Baggage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaggageConfig {
    /// Fields stored in each context's container
    pub fields: Vec<BaggageFieldConfig>,
    /// Read-only fields with a fixed value, keyed by name
    pub constants: BTreeMap<String, String>,
}

/// One baggage field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BaggageFieldConfig {
    /// Field name
    pub name: String,
    /// Extra carrier keys, in addition to the lower-cased name
    pub remote_keys: Vec<String>,
    /// Keep the field in-process only
    pub local: bool,
}

/// Correlation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Mirror `traceId` and `spanId`
    pub include_defaults: bool,
    /// Additional mirrored fields
    pub fields: Vec<CorrelationFieldConfig>,
}

/// One mirrored field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationFieldConfig {
    /// Baggage field, constant or built-in name
    pub baggage: String,
    /// Store key, defaults to the field name
    pub name: Option<String>,
    /// Always write and revert
    pub dirty: bool,
    /// Write as soon as the baggage value changes
    pub flush_on_update: bool,
}

/// Scope manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Seed spawned threads with the parent's context
    pub inheritable: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Debugging detail
    Debug,
    /// Normal operation
    Info,
    /// Warnings only
    Warn,
    /// Errors only
    Error,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            include_defaults: true,
            fields: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();

        for field in &self.baggage.fields {
            let name = field.name.trim();
            if name.is_empty() {
                return Err(PropagationError::config("baggage field name must not be empty"));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(PropagationError::DuplicateField(name.to_string()));
            }
            if field.local {
                if !field.remote_keys.is_empty() {
                    return Err(PropagationError::config(format!(
                        "local baggage field '{}' cannot have remote keys",
                        name
                    )));
                }
                continue;
            }
            let mut field_keys = HashSet::new();
            field_keys.insert(name.to_lowercase());
            for key in &field.remote_keys {
                let key = key.trim().to_lowercase();
                if key.is_empty() {
                    return Err(PropagationError::config(format!(
                        "baggage field '{}' has an empty remote key",
                        name
                    )));
                }
                field_keys.insert(key);
            }
            for key in field_keys {
                if !keys.insert(key.clone()) {
                    return Err(PropagationError::DuplicateKey(key));
                }
            }
        }

        for name in self.baggage.constants.keys() {
            let name = name.trim();
            if name.is_empty() {
                return Err(PropagationError::config("constant name must not be empty"));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(PropagationError::DuplicateField(name.to_string()));
            }
        }

        // Fields are identified by lower-cased name, store keys likewise.
        let mut store_keys = HashSet::new();
        let mut correlated = HashSet::new();
        if self.correlation.include_defaults {
            for default in ["traceid", "spanid"] {
                store_keys.insert(default.to_string());
                correlated.insert(default.to_string());
            }
        }
        for field in &self.correlation.fields {
            let baggage = field.baggage.trim().to_lowercase();
            let known = names.contains(&baggage)
                || BUILTIN_NAMES.iter().any(|b| b.to_lowercase() == baggage);
            if !known {
                return Err(PropagationError::config(format!(
                    "correlation field refers to unknown baggage '{}'",
                    field.baggage
                )));
            }
            if !correlated.insert(baggage) {
                return Err(PropagationError::DuplicateField(field.baggage.trim().to_string()));
            }
            let name = field.name.as_deref().unwrap_or(&field.baggage).trim();
            if name.is_empty() {
                return Err(PropagationError::config("correlation name must not be empty"));
            }
            if !store_keys.insert(name.to_lowercase()) {
                return Err(PropagationError::DuplicateName(name.to_string()));
            }
        }

        if store_keys.len() > MAX_FIELDS {
            return Err(PropagationError::TooManyFields {
                count: store_keys.len(),
                limit: MAX_FIELDS,
            });
        }

        Ok(())
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Add a remotely propagated baggage field
    pub fn remote_field(mut self, name: &str, remote_keys: &[&str]) -> Self {
        self.config.baggage.fields.push(BaggageFieldConfig {
            name: name.to_string(),
            remote_keys: remote_keys.iter().map(|k| (*k).to_string()).collect(),
            local: false,
        });
        self
    }

    /// Add an in-process baggage field
    pub fn local_field(mut self, name: &str) -> Self {
        self.config.baggage.fields.push(BaggageFieldConfig {
            name: name.to_string(),
            remote_keys: Vec::new(),
            local: true,
        });
        self
    }

    /// Add a constant field
    pub fn constant(mut self, name: &str, value: &str) -> Self {
        self.config
            .baggage
            .constants
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Mirror a field into the correlation store
    pub fn correlate(mut self, field: CorrelationFieldConfig) -> Self {
        self.config.correlation.fields.push(field);
        self
    }

    /// Mirror `traceId` and `spanId`
    pub fn include_default_correlation(mut self, include: bool) -> Self {
        self.config.correlation.include_defaults = include;
        self
    }

    /// Use inheritable context storage
    pub fn inheritable(mut self, inheritable: bool) -> Self {
        self.config.scope.inheritable = inheritable;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl CorrelationFieldConfig {
    /// Mirror `baggage` under its own name
    pub fn new(baggage: &str) -> Self {
        CorrelationFieldConfig {
            baggage: baggage.to_string(),
            ..Default::default()
        }
    }

    /// Use a different store key
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Write as soon as the baggage value changes
    pub fn flush_on_update(mut self) -> Self {
        self.flush_on_update = true;
        self
    }

    /// Always write and revert
    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.correlation.include_defaults);
    }

    #[test]
    fn test_empty_field_name() {
        let config = ConfigBuilder::new().local_field("  ").build();
        assert!(matches!(config, Err(PropagationError::Config(_))));
    }

    #[test]
    fn test_duplicate_field_across_constants() {
        let config = ConfigBuilder::new()
            .remote_field("region", &[])
            .constant("Region", "eu")
            .build();
        assert!(matches!(config, Err(PropagationError::DuplicateField(_))));
    }

    #[test]
    fn test_duplicate_remote_key() {
        let config = ConfigBuilder::new()
            .remote_field("userId", &["user_name"])
            .remote_field("userName", &["USER_NAME"])
            .build();
        assert!(matches!(config, Err(PropagationError::DuplicateKey(k)) if k == "user_name"));
    }

    #[test]
    fn test_unknown_correlation_field() {
        let config = ConfigBuilder::new()
            .correlate(CorrelationFieldConfig::new("userId"))
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn test_correlation_name_clash_with_defaults() {
        let config = ConfigBuilder::new()
            .local_field("requestId")
            .correlate(CorrelationFieldConfig::new("requestId").named("TraceId"))
            .build();
        assert!(matches!(config, Err(PropagationError::DuplicateName(_))));
    }

    #[test]
    fn test_too_many_correlation_fields() {
        let mut builder = ConfigBuilder::new();
        for i in 0..31 {
            let name = format!("field{i}");
            builder = builder
                .local_field(&name)
                .correlate(CorrelationFieldConfig::new(&name));
        }
        let err = builder.build().unwrap_err();
        assert!(matches!(err, PropagationError::TooManyFields { count: 33, limit: 32 }));
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .remote_field("userName", &["user_name"])
            .constant("region", "us-east-1")
            .correlate(CorrelationFieldConfig::new("userName").flush_on_update())
            .correlate(CorrelationFieldConfig::new("parentId"))
            .inheritable(true)
            .log_level(LogLevel::Debug)
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.baggage.fields.len(), 1);
        assert_eq!(config.correlation.fields.len(), 2);
        assert!(config.scope.inheritable);
        assert_eq!(config.logging.level.as_str(), "debug");
        assert!(config.debug);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
baggage:
  fields:
    - name: userName
      remote_keys: [user_name]
    - name: session
      local: true
  constants:
    region: us-east-1
correlation:
  fields:
    - baggage: userName
      flush_on_update: true
    - baggage: region
      name: aws.region
logging:
  level: debug
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build();

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.baggage.fields[0].remote_keys, vec!["user_name"]);
        assert!(config.baggage.fields[1].local);
        assert_eq!(config.baggage.constants.get("region").map(String::as_str), Some("us-east-1"));
        assert_eq!(config.correlation.fields[1].name.as_deref(), Some("aws.region"));
        assert!(config.correlation.include_defaults);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Config::from_yaml("baggage: [").unwrap_err();
        assert!(matches!(err, PropagationError::Yaml(_)));
    }
}
