//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError};

#[test]
fn type_error_has_type_error_kind() {
    let error = JsError::type_error("Expected a string");
    assert_eq!(error.kind, ErrorKind::TypeError);
    assert_eq!(error.name(), "TypeError");
    assert!(error.cause.is_none());
}

#[test]
fn display_matches_javascript_to_string() {
    let error = JsError::new(ErrorKind::InternalError, "Invalid array length");
    assert_eq!(error.to_string(), "InternalError: Invalid array length");
}

#[test]
fn cause_chain_is_preserved_through_clone() {
    let error = JsError::error("request failed").with_cause(JsError::error("timeout"));
    let cloned = error.clone();
    assert_eq!(cloned, error);
    assert_eq!(cloned.cause.map(|c| c.message), Some("timeout".to_string()));
}

#[test]
fn aggregate_error_lists_reasons_in_order() {
    let error = JsError::aggregate(
        "All promises were rejected",
        vec![
            JsError::error("Error 1"),
            JsError::error("Error 2"),
            JsError::error("Error 3"),
        ],
    );
    let messages: Vec<_> = error.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["Error 1", "Error 2", "Error 3"]);
}

#[test]
fn serializes_without_empty_fields() {
    let error = JsError::type_error("boom");
    let json = serde_json::to_value(&error).unwrap();
    assert_eq!(json["kind"], "TypeError");
    assert_eq!(json["message"], "boom");
    assert!(json.get("cause").is_none());
    assert!(json.get("errors").is_none());
}
