//! # Value Coercion
//!
//! Converts raw untyped values into declared target types. Pure and
//! stateless; every rule is total over the declared types:
//!
//! - string -> integer/float requires the entire string to parse; the decimal
//!   separator is fixed to `.` (no locale-dependent parsing)
//! - string -> boolean accepts exactly `true`, `false`, `1`, `0`, `yes`, `no`
//!   (case-insensitive)
//! - float -> integer succeeds only for integral floats within `i64` range;
//!   truncation is never silent
//! - integer -> float always succeeds
//! - list coercion is element-wise and reports the index of the first
//!   failing element
//! - map coercion applies per-entry coercion and reports the failing key
//! - `null` never coerces to a concrete type; a missing key and an invalid
//!   value are distinct conditions

use crate::error::ResolveError;
use crate::schema::FieldType;
use crate::value::{KeyPath, RawValue, Value};
use std::collections::BTreeMap;

/// Coerce `raw` to `target`, or report a [`ResolveError::Coercion`] naming
/// the path, the offending raw value and the reason.
pub fn coerce(path: &KeyPath, raw: &RawValue, target: &FieldType) -> Result<Value, ResolveError> {
    match target {
        FieldType::String => coerce_string(path, raw),
        FieldType::Integer => coerce_integer(path, raw),
        FieldType::Float => coerce_float(path, raw),
        FieldType::Boolean => coerce_boolean(path, raw),
        FieldType::List(element) => coerce_list(path, raw, element),
        FieldType::Map(element) => coerce_map(path, raw, element),
    }
}

fn coerce_string(path: &KeyPath, raw: &RawValue) -> Result<Value, ResolveError> {
    match raw {
        RawValue::String(s) => Ok(Value::String(s.clone())),
        other => Err(error(path, other, &FieldType::String, format!("found {}", other.type_name()))),
    }
}

fn coerce_integer(path: &KeyPath, raw: &RawValue) -> Result<Value, ResolveError> {
    match raw {
        RawValue::Integer(i) => Ok(Value::Integer(*i)),
        RawValue::Float(x) => {
            if x.fract() == 0.0 && *x >= i64::MIN as f64 && *x <= i64::MAX as f64 {
                Ok(Value::Integer(*x as i64))
            } else {
                Err(error(
                    path,
                    raw,
                    &FieldType::Integer,
                    format!("float {x} has a fractional part or is out of range"),
                ))
            }
        }
        RawValue::String(s) => s.parse::<i64>().map(Value::Integer).map_err(|_| {
            error(path, raw, &FieldType::Integer, "not a valid integer".to_string())
        }),
        other => Err(error(path, other, &FieldType::Integer, format!("found {}", other.type_name()))),
    }
}

fn coerce_float(path: &KeyPath, raw: &RawValue) -> Result<Value, ResolveError> {
    match raw {
        RawValue::Float(x) => Ok(Value::Float(*x)),
        RawValue::Integer(i) => Ok(Value::Float(*i as f64)),
        RawValue::String(s) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| error(path, raw, &FieldType::Float, "not a valid float".to_string())),
        other => Err(error(path, other, &FieldType::Float, format!("found {}", other.type_name()))),
    }
}

/// Tokens accepted for string -> boolean coercion (case-insensitive).
const TRUE_TOKENS: [&str; 3] = ["true", "1", "yes"];
const FALSE_TOKENS: [&str; 3] = ["false", "0", "no"];

fn coerce_boolean(path: &KeyPath, raw: &RawValue) -> Result<Value, ResolveError> {
    match raw {
        RawValue::Bool(b) => Ok(Value::Bool(*b)),
        RawValue::String(s) => {
            let token = s.to_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Ok(Value::Bool(true))
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Ok(Value::Bool(false))
            } else {
                Err(error(
                    path,
                    raw,
                    &FieldType::Boolean,
                    "expected one of true/false/1/0/yes/no".to_string(),
                ))
            }
        }
        other => Err(error(path, other, &FieldType::Boolean, format!("found {}", other.type_name()))),
    }
}

fn coerce_list(path: &KeyPath, raw: &RawValue, element: &FieldType) -> Result<Value, ResolveError> {
    match raw {
        RawValue::Sequence(items) => {
            let mut coerced = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                coerced.push(coerce(&path.indexed(index), item, element)?);
            }
            Ok(Value::List(coerced))
        }
        other => Err(error(
            path,
            other,
            &FieldType::List(Box::new(element.clone())),
            format!("found {}", other.type_name()),
        )),
    }
}

fn coerce_map(path: &KeyPath, raw: &RawValue, element: &FieldType) -> Result<Value, ResolveError> {
    match raw {
        RawValue::Mapping(entries) => {
            let mut coerced = BTreeMap::new();
            for (key, item) in entries {
                coerced.insert(key.clone(), coerce(&path.join(key), item, element)?);
            }
            Ok(Value::Map(coerced))
        }
        other => Err(error(
            path,
            other,
            &FieldType::Map(Box::new(element.clone())),
            format!("found {}", other.type_name()),
        )),
    }
}

fn error(path: &KeyPath, raw: &RawValue, target: &FieldType, reason: String) -> ResolveError {
    ResolveError::Coercion {
        path: path.clone(),
        raw: raw.to_string(),
        target: target.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> KeyPath {
        KeyPath::from("test.key")
    }

    #[test]
    fn test_string_to_integer_full_parse() {
        let coerced = coerce(&path(), &RawValue::from("12"), &FieldType::Integer).unwrap();
        assert_eq!(coerced, Value::Integer(12));
    }

    #[test]
    fn test_string_to_integer_partial_parse_fails() {
        let result = coerce(&path(), &RawValue::from("12abc"), &FieldType::Integer);
        assert!(matches!(
            result,
            Err(ResolveError::Coercion { raw, .. }) if raw == "12abc"
        ));
    }

    #[test]
    fn test_string_with_whitespace_fails() {
        assert!(coerce(&path(), &RawValue::from("12 "), &FieldType::Integer).is_err());
    }

    #[test]
    fn test_integral_float_to_integer() {
        let coerced = coerce(&path(), &RawValue::Float(45.0), &FieldType::Integer).unwrap();
        assert_eq!(coerced, Value::Integer(45));
    }

    #[test]
    fn test_fractional_float_to_integer_fails() {
        let result = coerce(&path(), &RawValue::Float(4.5), &FieldType::Integer);
        assert!(matches!(
            result,
            Err(ResolveError::Coercion { reason, .. }) if reason.contains("fractional")
        ));
    }

    #[test]
    fn test_integer_to_float() {
        let coerced = coerce(&path(), &RawValue::Integer(45), &FieldType::Float).unwrap();
        assert_eq!(coerced, Value::Float(45.0));
    }

    #[test]
    fn test_string_to_float() {
        let coerced = coerce(&path(), &RawValue::from("0.5"), &FieldType::Float).unwrap();
        assert_eq!(coerced, Value::Float(0.5));
    }

    #[test]
    fn test_boolean_token_set() {
        for token in ["true", "TRUE", "1", "Yes"] {
            let coerced = coerce(&path(), &RawValue::from(token), &FieldType::Boolean).unwrap();
            assert_eq!(coerced, Value::Bool(true), "token {token}");
        }
        for token in ["false", "0", "NO"] {
            let coerced = coerce(&path(), &RawValue::from(token), &FieldType::Boolean).unwrap();
            assert_eq!(coerced, Value::Bool(false), "token {token}");
        }
        assert!(coerce(&path(), &RawValue::from("on"), &FieldType::Boolean).is_err());
    }

    #[test]
    fn test_integer_to_boolean_fails() {
        assert!(coerce(&path(), &RawValue::Integer(1), &FieldType::Boolean).is_err());
    }

    #[test]
    fn test_number_to_string_fails() {
        let result = coerce(&path(), &RawValue::Integer(5432), &FieldType::String);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_element_wise() {
        let raw = RawValue::Sequence(vec![
            RawValue::from("1"),
            RawValue::Integer(2),
            RawValue::Float(3.0),
        ]);
        let coerced = coerce(
            &path(),
            &raw,
            &FieldType::List(Box::new(FieldType::Integer)),
        )
        .unwrap();
        assert_eq!(
            coerced,
            Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
    }

    #[test]
    fn test_list_reports_failing_index() {
        let raw = RawValue::Sequence(vec![RawValue::from("1"), RawValue::from("two")]);
        let result = coerce(
            &path(),
            &raw,
            &FieldType::List(Box::new(FieldType::Integer)),
        );
        assert!(matches!(
            result,
            Err(ResolveError::Coercion { path, .. }) if path.as_str() == "test.key[1]"
        ));
    }

    #[test]
    fn test_map_per_key() {
        let mut entries = BTreeMap::new();
        entries.insert("read".to_string(), RawValue::from("10"));
        entries.insert("write".to_string(), RawValue::Integer(20));
        let coerced = coerce(
            &path(),
            &RawValue::Mapping(entries),
            &FieldType::Map(Box::new(FieldType::Integer)),
        )
        .unwrap();

        let Value::Map(map) = coerced else {
            panic!("expected map");
        };
        assert_eq!(map["read"], Value::Integer(10));
        assert_eq!(map["write"], Value::Integer(20));
    }

    #[test]
    fn test_map_reports_failing_entry() {
        let mut entries = BTreeMap::new();
        entries.insert("write".to_string(), RawValue::from("lots"));
        let result = coerce(
            &path(),
            &RawValue::Mapping(entries),
            &FieldType::Map(Box::new(FieldType::Integer)),
        );
        assert!(matches!(
            result,
            Err(ResolveError::Coercion { path, .. }) if path.as_str() == "test.key.write"
        ));
    }

    #[test]
    fn test_null_never_coerces() {
        for target in [FieldType::String, FieldType::Integer, FieldType::Float, FieldType::Boolean] {
            assert!(coerce(&path(), &RawValue::Null, &target).is_err(), "{target}");
        }
    }
}
