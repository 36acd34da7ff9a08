//! Error types for the Turnstile service.

use thiserror::Error;

/// An invalid rate specification.
///
/// Raised while policies are being set up, never while requests are served.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A count, amount or period that must be strictly positive was not.
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Which part of the specification was rejected
        field: &'static str,
        /// The rejected value as written
        value: String,
    },

    /// The unit after the slash is not second, minute, hour or day.
    #[error("unknown rate unit {0:?} (expected second, minute, hour or day)")]
    UnknownUnit(String),

    /// The descriptor does not match `<N>/<unit>`.
    #[error("malformed rate {0:?} (expected \"<N>/<unit>\")")]
    Malformed(String),
}

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Invalid rate specification for a route
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Settings could not be loaded or deserialized
    #[error("Settings error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for TurnstileError {
    fn from(err: config::ConfigError) -> Self {
        TurnstileError::Config(err.to_string())
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
