//! Unit tests for Value

use core_types::Value;

#[test]
fn number_prefers_small_integers() {
    assert_eq!(Value::number(4.0), Value::Smi(4));
    assert_eq!(Value::number(-7.0), Value::Smi(-7));
    assert_eq!(Value::number(2.5), Value::Double(2.5));
    assert_eq!(Value::number(1e12), Value::Double(1e12));
}

#[test]
fn as_number_only_for_numbers() {
    assert_eq!(Value::Smi(3).as_number(), Some(3.0));
    assert_eq!(Value::Double(0.5).as_number(), Some(0.5));
    assert_eq!(Value::from("3").as_number(), None);
    assert_eq!(Value::Null.as_number(), None);
}

#[test]
fn display_formats_special_doubles() {
    assert_eq!(Value::Double(f64::NAN).to_string(), "NaN");
    assert_eq!(Value::Double(f64::INFINITY).to_string(), "Infinity");
    assert_eq!(Value::Double(f64::NEG_INFINITY).to_string(), "-Infinity");
    assert_eq!(Value::Double(0.5).to_string(), "0.5");
}

#[test]
fn serializes_untagged() {
    assert_eq!(serde_json::to_string(&Value::Smi(3)).unwrap(), "3");
    assert_eq!(serde_json::to_string(&Value::from("a")).unwrap(), "\"a\"");
    assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
}
