use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hostsync
#[derive(Error, Debug)]
pub enum HostsyncError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// No API credential available in the environment
    #[error("API credential not set: environment variable {env_var} is missing or empty")]
    MissingCredential { env_var: String },

    /// The transport could not complete a request (network failure, timeout)
    #[error("Transport error from {source_name} after {fetched} records: {message}")]
    Transport {
        source_name: String,
        fetched: usize,
        message: String,
    },

    /// HTTP error response that is not the pagination exhaustion signal
    #[error("Upstream error from {source_name} after {fetched} records: HTTP {status}: {body}")]
    Upstream {
        source_name: String,
        status: u16,
        body: String,
        fetched: usize,
    },

    /// A 200 response whose body is not a JSON array of objects
    #[error("Malformed page from {source_name} after {fetched} records: {source}")]
    Decode {
        source_name: String,
        fetched: usize,
        source: serde_json::Error,
    },

    /// A pipeline phase failed
    #[error("Pipeline failed during {phase} with {accumulated} records accumulated: {source}")]
    Phase {
        phase: Phase,
        accumulated: usize,
        source: Box<HostsyncError>,
    },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),
}

impl HostsyncError {
    /// Strip any `Phase` wrappers and return the underlying error
    pub fn root(&self) -> &HostsyncError {
        match self {
            HostsyncError::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self.root(),
            HostsyncError::Config(_)
                | HostsyncError::ConfigValidation { .. }
                | HostsyncError::ConfigNotFound { .. }
                | HostsyncError::InvalidConfigValue { .. }
                | HostsyncError::MissingCredential { .. }
        )
    }

    pub fn is_transport_error(&self) -> bool {
        matches!(self.root(), HostsyncError::Transport { .. })
    }

    pub fn is_upstream_error(&self) -> bool {
        matches!(self.root(), HostsyncError::Upstream { .. })
    }
}

/// Pipeline phase, used to report where a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Extract,
    Transform,
    Load,
    Visualize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Extract => "extract",
            Phase::Transform => "transform",
            Phase::Load => "load",
            Phase::Visualize => "visualize",
        };
        f.write_str(name)
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for hostsync operations
pub type Result<T> = std::result::Result<T, HostsyncError>;
