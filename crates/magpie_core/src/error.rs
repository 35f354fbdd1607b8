//! Error types for the magpie core.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Configuration-specific errors
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Invalid regex `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Configuration error in {path}")]
    #[diagnostic(
        code(magpie_core::configuration_error),
        help("Check the rule file at {path}")
    )]
    Configuration {
        path: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Network error during {operation}: {detail}")]
    #[diagnostic(
        code(magpie_core::network_error),
        help("Recoverable transport failure; the current operation was abandoned")
    )]
    Network { operation: String, detail: String },

    #[error("Invalid conversation id: {id}")]
    #[diagnostic(
        code(magpie_core::invalid_conversation),
        help("Conversation ids must be valid transport channel identifiers")
    )]
    InvalidConversation { id: String },

    #[error("Archive error: {0}")]
    #[diagnostic(code(magpie_core::archive_error))]
    Archive(#[from] std::io::Error),
}

impl CoreError {
    /// Create a configuration error for the given rule file path.
    pub fn configuration(path: impl Into<String>, cause: ConfigError) -> Self {
        Self::Configuration {
            path: path.into(),
            cause,
        }
    }

    /// Create a recoverable network error.
    pub fn network(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error is a recoverable transport failure.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
