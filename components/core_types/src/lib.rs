//! Core value and error types shared by the runtime components.
//!
//! This crate provides the canonical rejection payload used across the
//! scheduler and futures, plus a small primitive value type.
//!
//! # Overview
//!
//! - [`Value`] - Primitive JavaScript values (undefined, null, booleans,
//!   numbers, strings)
//! - [`JsError`] - Structured error with kind, message, cause and, for
//!   aggregate errors, the list of underlying reasons
//! - [`ErrorKind`] - Types of JavaScript errors
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::number(42.0);
//! assert_eq!(num, Value::Smi(42));
//!
//! let error = JsError::type_error("undefined is not a function");
//! assert_eq!(error.kind, ErrorKind::TypeError);
//! assert_eq!(error.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{ErrorKind, JsError};
pub use value::Value;
