//! Contract compliance tests for core_types
//!
//! The rejection payload shared by every component must expose kind,
//! message, cause and the aggregate reason list.

use core_types::{ErrorKind, JsError, Value};

mod error_contract_tests {
    use super::*;

    #[test]
    fn js_error_is_std_error() {
        fn assert_error<E: std::error::Error + Clone + 'static>() {}
        assert_error::<JsError>();
    }

    #[test]
    fn js_error_has_structured_fields() {
        let error = JsError::error("x");
        let _: &ErrorKind = &error.kind;
        let _: &String = &error.message;
        let _: &Option<Box<JsError>> = &error.cause;
        let _: &Vec<JsError> = &error.errors;
    }
}

mod value_contract_tests {
    use super::*;

    #[test]
    fn value_default_is_undefined() {
        assert_eq!(Value::default(), Value::Undefined);
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from(7), Value::Smi(7));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from("s".to_string()), Value::String("s".into()));
    }
}
