use thiserror::Error;

/// Errors raised while configuring or running propagation.
#[derive(Error, Debug)]
pub enum PropagationError {
    /// Rejected name or value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Context built without a required id
    #[error("{0}")]
    MissingIdentifier(String),

    /// Baggage field added twice
    #[error("Baggage field already added: {0}")]
    DuplicateField(String),

    /// Correlation store key used twice
    #[error("Correlation name already in use: {0}")]
    DuplicateName(String),

    /// Carrier key claimed by two fields
    #[error("Propagation key already in use: {0}")]
    DuplicateKey(String),

    /// More correlation fields than dirty tracking supports
    #[error("Too many correlation fields: {count} configured, limit {limit}")]
    TooManyFields {
        /// Fields configured
        count: usize,
        /// Most fields allowed
        limit: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed text
    #[error("Parse error: {message}")]
    Parse {
        /// What was wrong
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON output error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for propagation operations
pub type Result<T> = std::result::Result<T, PropagationError>;

impl PropagationError {
    /// Creates a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Returns true when the error comes from setup rather than runtime data.
    ///
    /// Configuration mistakes are meant to fail loudly at startup, so callers
    /// usually abort on these instead of degrading.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::DuplicateField(_)
                | Self::DuplicateName(_)
                | Self::DuplicateKey(_)
                | Self::TooManyFields { .. }
                | Self::Config(_)
                | Self::Yaml(_)
        )
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) | Self::MissingIdentifier(_) => "validation",
            Self::DuplicateField(_)
            | Self::DuplicateName(_)
            | Self::DuplicateKey(_)
            | Self::TooManyFields { .. } => "correlation",
            Self::Config(_) | Self::Yaml(_) => "config",
            Self::Parse { .. } | Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}
