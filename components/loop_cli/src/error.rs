//! Error types for the CLI

use core_types::JsError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// No scenario with this name
    #[error("unknown scenario '{0}' (run with --list to see the available ones)")]
    UnknownScenario(String),

    /// Neither a scenario nor `--list` was requested
    #[error("no scenario given; pass --scenario <NAME> or --list")]
    NoScenario,

    /// Error raised while setting up a scenario
    #[error("scenario failed: {0}")]
    JsError(#[from] JsError),

    /// Report could not be rendered as JSON
    #[error("JSON output error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Writing to stdout failed
    #[error("output error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
