//! Error types for Repeater
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Repeater operations
///
/// Executor-level failures (missing request, network errors, runaway
/// chains) never surface as this type to callers of the command contract:
/// they are folded into an `ExecutionResult`. This enum covers everything
/// else: configuration, storage, scheduling, and curl validation.
#[derive(Error, Debug)]
pub enum RepeaterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Curl command could not be parsed or validated
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Cron expression is malformed or never fires
    #[error(transparent)]
    Cron(#[from] CronError),

    /// Referenced request does not exist
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    /// Referenced group does not exist
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    /// Live cookie lookup failed
    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Persistent store errors (backend access, encoding)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Reasons a curl command is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input is empty or does not start with `curl`
    #[error("Command must start with \"curl\"")]
    NotACurlCommand,

    /// No URL could be extracted from the command
    #[error("No URL found in curl command")]
    NoUrlFound,

    /// The extracted URL is not an absolute URL
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Reasons a cron expression is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CronError {
    /// Wrong number of whitespace-separated fields
    #[error("Invalid cron expression: expected 5 fields, found {0}")]
    FieldCount(usize),

    /// A field could not be parsed
    #[error("Invalid cron expression: bad {field} field '{value}'")]
    InvalidField {
        /// Name of the offending field
        field: &'static str,
        /// Raw text of the field
        value: String,
    },

    /// The expression does not match any minute within the search horizon
    #[error("Cron expression '{0}' has no run within the next year")]
    NoNextRun(String),
}

/// Result type alias for Repeater operations
///
/// Uses `anyhow::Error` as the error type, allowing rich context and
/// easy propagation; typed errors are recovered with `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
