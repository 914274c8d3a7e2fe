//! Command-line interface for inspecting propagation behaviour.
//!
//! `urpo-ctx` parses ids, extracts B3 and baggage from headers given as
//! `key=value` pairs, and replays a request scope against the thread-local
//! correlation store so the effect of a configuration can be seen directly.

use crate::application::Application;
use crate::baggage::BaggageField;
use crate::core::config::ConfigBuilder;
use crate::core::{Config, PropagationError, Result};
use crate::correlation::ThreadLocalCorrelationContext;
use crate::propagation::{hex, Extracted, TraceContextOrSamplingFlags};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Trace context propagation and log correlation toolkit
#[derive(Parser, Debug)]
#[command(name = "urpo-ctx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/urpo/propagation.yaml)
    #[arg(short, long, env = "URPO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "URPO_DEBUG", global = true)]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,

    /// What to run
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and re-render a trace id and optional span id
    Ids {
        /// Trace id, 1 to 32 hex characters
        trace_id: String,
        /// Span id, 1 to 16 hex characters
        span_id: Option<String>,
    },
    /// Extract B3 state and baggage from headers
    Extract {
        /// Header as key=value, repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
    },
    /// Run a request scope and show the correlation store
    Correlate {
        /// Header as key=value, repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
        /// Baggage update applied inside the scope as name=value, repeatable
        #[arg(short, long = "set", value_parser = parse_pair)]
        set: Vec<(String, String)>,
    },
}

/// Extraction result printed by `extract`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    /// Which variant was extracted
    pub kind: &'static str,
    /// Trace id, when one was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Span id, when a full context was present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// Parent id, when a full context carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Sampling decision
    pub sampled: Option<bool>,
    /// Debug flag
    pub debug: bool,
    /// Non-empty baggage values
    pub baggage: BTreeMap<String, String>,
}

impl ExtractReport {
    /// Summarizes what was extracted.
    pub fn new(extracted: &TraceContextOrSamplingFlags) -> Self {
        let baggage = BaggageField::get_all_values(extracted).into_iter().collect();
        match extracted.value() {
            Extracted::Context(context) => ExtractReport {
                kind: "context",
                trace_id: Some(context.trace_id_string().to_string()),
                span_id: Some(context.span_id_string().to_string()),
                parent_id: context.parent_id_string().map(str::to_string),
                sampled: context.sampled(),
                debug: context.debug(),
                baggage,
            },
            Extracted::TraceIdContext(context) => ExtractReport {
                kind: "traceIdContext",
                trace_id: Some(context.trace_id_string()),
                span_id: None,
                parent_id: None,
                sampled: context.sampled(),
                debug: context.debug(),
                baggage,
            },
            Extracted::SamplingFlags(flags) => ExtractReport {
                kind: "samplingFlags",
                trace_id: None,
                span_id: None,
                parent_id: None,
                sampled: flags.sampled(),
                debug: flags.debug(),
                baggage,
            },
        }
    }
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration from `--config`, or the default location when present.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => {
                let default_path = dirs::config_dir()
                    .map(|d| d.join("urpo").join("propagation.yaml"))
                    .unwrap_or_else(|| PathBuf::from("~/.config/urpo/propagation.yaml"));
                if !default_path.exists() {
                    return builder.debug(self.debug).build();
                }
                default_path
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
                tracing::info!("Loaded configuration from: {:?}", config_path);
            }
            Err(e) if self.config.is_some() => {
                return Err(PropagationError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            }
            Err(_) => {
                tracing::debug!("No config file found at {:?}, using defaults", config_path);
            }
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging from the loaded configuration.
    ///
    /// `RUST_LOG` wins, then `--debug`, then `URPO_LOG_LEVEL`, then `logging.level`.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let level = log_level(config, std::env::var("URPO_LOG_LEVEL").ok());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_writer(std::io::stderr)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| PropagationError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Filter directive when `RUST_LOG` is unset.
fn log_level(config: &Config, env_level: Option<String>) -> String {
    if config.debug {
        return "debug".to_string();
    }
    env_level.unwrap_or_else(|| config.logging.level.as_str().to_string())
}

/// Execute the selected command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;

    cli.init_logging(&config)?;
    tracing::debug!(level = config.logging.level.as_str(), structured = config.logging.structured, "logging initialized");

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Baggage fields: {}", config.baggage.fields.len());
        println!("  Constants: {}", config.baggage.constants.len());
        println!(
            "  Correlation fields: {}{}",
            config.correlation.fields.len(),
            if config.correlation.include_defaults { " (+ traceId, spanId)" } else { "" }
        );
        println!("  Inheritable scope: {}", config.scope.inheritable);
        return Ok(());
    }

    match cli.command {
        Some(Command::Ids { trace_id, span_id }) => ids(&trace_id, span_id.as_deref()),
        Some(Command::Extract { headers }) => {
            let app = Application::new(config, Arc::new(ThreadLocalCorrelationContext))?;
            let extracted = app.extract(&headers.into_iter().collect::<HashMap<_, _>>());
            println!("{}", serde_json::to_string_pretty(&ExtractReport::new(&extracted))?);
            Ok(())
        }
        Some(Command::Correlate { headers, set }) => {
            let app = Application::new(config, Arc::new(ThreadLocalCorrelationContext))?;
            correlate(&app, headers.into_iter().collect(), &set).await
        }
        None => {
            println!("Nothing to do; see --help");
            Ok(())
        }
    }
}

fn ids(trace_id: &str, span_id: Option<&str>) -> Result<()> {
    let (high, low) = hex::parse_trace_id(trace_id)
        .ok_or_else(|| PropagationError::parse(format!("invalid trace id '{trace_id}'")))?;
    println!("traceId: {}", hex::trace_id_string(high, low));
    println!("  high: {high}");
    println!("  low:  {low}");
    if let Some(span_id) = span_id {
        let span = hex::parse_span_id(span_id)
            .ok_or_else(|| PropagationError::parse(format!("invalid span id '{span_id}'")))?;
        println!("spanId:  {}", hex::to_lower_hex(span));
        println!("  value: {span}");
    }
    Ok(())
}

async fn correlate(app: &Application, headers: HashMap<String, String>, set: &[(String, String)]) -> Result<()> {
    let extracted = app.extract(&headers);
    print_store("before", &ThreadLocalCorrelationContext::snapshot());

    let mut request = app.start_request(&extracted);
    print_store("in scope", &ThreadLocalCorrelationContext::snapshot());

    for (name, value) in set {
        let field = app
            .field(name)
            .ok_or_else(|| PropagationError::invalid_argument(format!("unknown baggage field '{name}'")))?;
        if !request.update(&field, Some(value)) {
            tracing::warn!(field = %field, "update had no effect");
        }
    }
    if !set.is_empty() {
        print_store("after updates", &ThreadLocalCorrelationContext::snapshot());
    }

    let task = app.current().wrap_future(async { ThreadLocalCorrelationContext::snapshot() });
    let seen = tokio::spawn(task)
        .await
        .map_err(|e| PropagationError::invalid_argument(format!("wrapped task failed: {e}")))?;
    print_store("wrapped task", &seen);

    request.after_completion(None, None);
    print_store("after", &ThreadLocalCorrelationContext::snapshot());
    Ok(())
}

fn print_store(label: &str, store: &BTreeMap<String, String>) {
    println!("{label}:");
    if store.is_empty() {
        println!("  (empty)");
    }
    for (key, value) in store {
        println!("  {key} = {value}");
    }
}
