//! Primitive JavaScript values.
//!
//! Futures in the scenario runner carry these values the way the lesson
//! scripts pass numbers and strings through promise chains.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a primitive JavaScript value.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let number = Value::Smi(42);
/// let float = Value::Double(3.5);
///
/// assert_eq!(number.as_number(), Some(42.0));
/// assert_eq!(float.to_string(), "3.5");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JavaScript undefined value
    #[default]
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value
    String(String),
}

impl Value {
    /// Returns the numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Smi(n) => Some(f64::from(*n)),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Builds a number, using the small-integer form when it fits.
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
            Value::Smi(n as i32)
        } else {
            Value::Double(n)
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// JavaScript `String()` conversion.
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::Undefined.to_string(), "undefined");
/// assert_eq!(Value::Boolean(true).to_string(), "true");
/// assert_eq!(Value::Double(4.0).to_string(), "4");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
        }
    }
}
