//! Configuration loading and validation.

use clap::Parser;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use urpo_propagation::cli::Cli;
use urpo_propagation::core::{Config, ConfigBuilder, CorrelationFieldConfig, LogLevel};
use urpo_propagation::correlation::MapCorrelationContext;
use urpo_propagation::{Application, PropagationError};

const YAML: &str = r#"
baggage:
  fields:
    - name: userId
      remote_keys: [baggage-user-id]
    - name: session
      local: true
  constants:
    region: eu-west-1
correlation:
  include_defaults: false
  fields:
    - baggage: userId
      flush_on_update: true
    - baggage: sampled
      name: trace.sampled
scope:
  inheritable: true
logging:
  level: warn
  structured: true
"#;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert!(config.baggage.fields.is_empty());
    assert!(config.correlation.include_defaults);
    assert!(!config.scope.inheritable);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_yaml_config() {
    let config = ConfigBuilder::new().from_yaml(YAML).unwrap().build().unwrap();

    assert_eq!(config.baggage.fields.len(), 2);
    assert_eq!(config.baggage.fields[0].remote_keys, vec!["baggage-user-id".to_string()]);
    assert!(config.baggage.fields[1].local);
    assert!(!config.correlation.include_defaults);
    assert_eq!(config.correlation.fields[1].name.as_deref(), Some("trace.sampled"));
    assert!(config.scope.inheritable);
    assert!(config.logging.structured);

    let app = Application::new(config, Arc::new(MapCorrelationContext::new())).unwrap();
    assert_eq!(
        app.baggage().keys(),
        vec!["b3", "x-b3-traceid", "x-b3-spanid", "x-b3-parentspanid", "x-b3-sampled", "x-b3-flags", "userid", "baggage-user-id"]
    );
}

#[tokio::test]
async fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(YAML.as_bytes()).unwrap();

    let path = file.path().to_str().unwrap();
    let cli = Cli::try_parse_from(["urpo-ctx", "--config", path, "--debug"]).unwrap();
    let config = cli.load_config().await.unwrap();

    assert!(config.debug);
    assert_eq!(config.baggage.constants.get("region").map(String::as_str), Some("eu-west-1"));
}

#[tokio::test]
async fn test_invalid_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "baggage:\n  fields:\n    - name: a\n    - name: A").unwrap();

    let path = file.path().to_str().unwrap();
    let cli = Cli::try_parse_from(["urpo-ctx", "--config", path]).unwrap();
    let err = cli.load_config().await.unwrap_err();
    assert!(matches!(err, PropagationError::DuplicateField(_)));
    assert_eq!(err.category(), "correlation");
}

#[test]
fn test_duplicates_rejected() {
    let duplicate_key = ConfigBuilder::new()
        .remote_field("a", &["shared"])
        .remote_field("b", &["shared"])
        .build();
    assert!(matches!(duplicate_key, Err(PropagationError::DuplicateKey(_))));

    let duplicate_name = ConfigBuilder::new()
        .local_field("a")
        .local_field("b")
        .correlate(CorrelationFieldConfig::new("a").named("same"))
        .correlate(CorrelationFieldConfig::new("b").named("SAME"))
        .build();
    assert!(matches!(duplicate_name, Err(PropagationError::DuplicateName(_))));
}

#[test]
fn test_local_field_with_remote_keys_rejected() {
    let yaml = "baggage:\n  fields:\n    - name: a\n      local: true\n      remote_keys: [x]\n";
    let err = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_field_correlated_twice_rejected() {
    let default_again = ConfigBuilder::new()
        .correlate(CorrelationFieldConfig::new("traceId").named("trace"))
        .build();
    assert!(matches!(default_again, Err(PropagationError::DuplicateField(_))));

    let renamed_twice = ConfigBuilder::new()
        .local_field("userId")
        .correlate(CorrelationFieldConfig::new("userId").named("user"))
        .correlate(CorrelationFieldConfig::new("USERID").named("user.id"))
        .build();
    assert!(matches!(renamed_twice, Err(PropagationError::DuplicateField(_))));

    // Without the defaults the built-in ids may be mapped explicitly.
    let config = ConfigBuilder::new()
        .include_default_correlation(false)
        .correlate(CorrelationFieldConfig::new("traceId").named("trace"))
        .build()
        .unwrap();
    assert!(Application::new(config, Arc::new(MapCorrelationContext::new())).is_ok());
}
