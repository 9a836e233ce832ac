//! JavaScript error types and error handling.
//!
//! [`JsError`] is the structured value carried on the rejection channel:
//! a kind, a human-readable message, an optional cause and, for
//! `AggregateError`, the reasons it wraps.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of JavaScript error.
///
/// These correspond to JavaScript's built-in error constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Plain `Error`
    Error,
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Several errors reported at once (`Promise.any` with no fulfillment)
    AggregateError,
    /// Internal engine error
    InternalError,
}

impl ErrorKind {
    /// Returns the constructor name, as reported by `error.name`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JavaScript error with kind, message and optional cause.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let root = JsError::type_error("undefined is not a function");
/// let error = JsError::new(ErrorKind::Error, "setup failed").with_cause(root);
///
/// assert_eq!(error.message, "setup failed");
/// assert_eq!(error.cause.as_ref().map(|c| c.kind), Some(ErrorKind::TypeError));
/// ```
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The error that caused this one, if any
    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<JsError>>,
    /// Underlying reasons of an `AggregateError`, in input order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JsError>,
}

impl JsError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            errors: Vec::new(),
        }
    }

    /// Creates a plain `Error`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates an `InternalError`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Creates an `AggregateError` wrapping `errors`.
    pub fn aggregate(message: impl Into<String>, errors: Vec<JsError>) -> Self {
        Self {
            errors,
            ..Self::new(ErrorKind::AggregateError, message)
        }
    }

    /// Attaches a cause to this error.
    pub fn with_cause(mut self, cause: JsError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the constructor name of this error.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
