//! Error types for pgscratch.
//!
//! Defines the main error enum used throughout the session.

use thiserror::Error;

/// Main error type for pgscratch operations.
#[derive(Error, Debug)]
pub enum ScratchError {
    /// A destructive statement was refused before reaching the database.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Database connection errors (host unreachable, auth failed, connection lost, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, malformed connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The named display sink does not exist.
    #[error("Display sink not found: {0}")]
    DisplaySinkMissing(String),

    /// The scripting escape could not evaluate its input.
    #[error("Script error: {0}")]
    Script(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScratchError {
    /// Creates a policy violation with the given message.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyViolation(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a missing-sink error for the given sink name.
    pub fn sink_missing(name: impl Into<String>) -> Self {
        Self::DisplaySinkMissing(name.into())
    }

    /// Creates a script error with the given message.
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PolicyViolation(_) => "Policy Violation",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::DisplaySinkMissing(_) => "Display Error",
            Self::Script(_) => "Script Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true if the error leaves the session usable for the next statement.
    pub fn is_statement_scoped(&self) -> bool {
        !matches!(self, Self::Connection(_) | Self::Internal(_))
    }
}

/// Result type alias using ScratchError.
pub type Result<T> = std::result::Result<T, ScratchError>;
