//! Error types for Rampart operations
//!
//! Errors are classified structurally. The retry predicate matches on
//! [`ErrorKind`] and status codes, never on message text.

use thiserror::Error;

/// Retry classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure or 5xx response. Eligible for backoff retry.
    Transient,
    /// 4xx response, validation failure or undecodable payload. Never retried.
    Terminal,
}

/// Failures surfaced by a transport call or its response handling.
///
/// `Clone` is required: a coalesced request hands the identical error to
/// every caller waiting on the same key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network failure: {reason}")]
    Network { reason: String },

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl TransportError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Classify this error for retry purposes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Transient,
            Self::Status { status, .. } if (500..600).contains(status) => ErrorKind::Transient,
            Self::Status { .. } | Self::InvalidResponse { .. } => ErrorKind::Terminal,
        }
    }

    /// The HTTP status code, if the server responded at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors that know whether they are worth retrying.
///
/// The default retry predicate is built on this trait.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Validation errors for locally constructed records.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}

/// Master error type for all Rampart errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RampartError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl Retryable for RampartError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Validation(_) | Self::Config(_) => false,
        }
    }
}

/// Result type alias for Rampart operations.
pub type RampartResult<T> = Result<T, RampartError>;

// =============================================================================
// TESTS
// =============================================================================
