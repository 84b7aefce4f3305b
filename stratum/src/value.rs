//! # Configuration Values
//!
//! Core value types for the resolution engine:
//! - [`KeyPath`]: dot-delimited, case-sensitive address of a configuration
//!   entry
//! - [`RawValue`]: untyped value as produced by a source, before coercion
//! - [`Value`]: typed value as stored in a resolved configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dot-delimited path addressing a (possibly nested) configuration entry.
///
/// Keys are case-sensitive and unique per full path. `KeyPath` orders
/// lexicographically so resolved output is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(String);

impl KeyPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the dot-separated segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Extends the path with one more segment.
    pub fn join(&self, segment: &str) -> KeyPath {
        if self.0.is_empty() {
            KeyPath(segment.to_string())
        } else {
            KeyPath(format!("{}.{}", self.0, segment))
        }
    }

    /// Path of a sequence element, used in coercion errors (`servers[2]`).
    pub(crate) fn indexed(&self, index: usize) -> KeyPath {
        KeyPath(format!("{}[{}]", self.0, index))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// Untyped value as produced by a [`Source`](crate::source::Source).
///
/// Immutable once produced. Deserializes directly from TOML, YAML and JSON
/// documents; the coercer converts it into a typed [`Value`] against the
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<RawValue>),
    Mapping(BTreeMap<String, RawValue>),
}

impl RawValue {
    /// Human-readable type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "boolean",
            RawValue::Integer(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::String(_) => "string",
            RawValue::Sequence(_) => "sequence",
            RawValue::Mapping(_) => "mapping",
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("null"),
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Integer(i) => write!(f, "{i}"),
            RawValue::Float(x) => write!(f, "{x}"),
            RawValue::String(s) => f.write_str(s),
            RawValue::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            RawValue::Mapping(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Integer(i)
    }
}

impl From<f64> for RawValue {
    fn from(x: f64) -> Self {
        RawValue::Float(x)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

/// Typed value held by a [`ResolvedConfig`](crate::resolver::ResolvedConfig).
///
/// `Opaque` carries keys that have no schema entry and were passed through
/// under the permissive unknown-key policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Opaque(RawValue),
}

impl Value {
    /// Human-readable type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Opaque(raw) => write!(f, "{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path_segments() {
        let path = KeyPath::from("providers.postgres.host");
        let segments: Vec<&str> = path.segments().collect();
        assert_eq!(segments, vec!["providers", "postgres", "host"]);
    }

    #[test]
    fn test_key_path_join() {
        let path = KeyPath::from("providers");
        assert_eq!(path.join("postgres"), KeyPath::from("providers.postgres"));
        assert_eq!(KeyPath::new("").join("root"), KeyPath::from("root"));
    }

    #[test]
    fn test_key_path_indexed() {
        let path = KeyPath::from("servers");
        assert_eq!(path.indexed(2).as_str(), "servers[2]");
    }

    #[test]
    fn test_key_path_is_case_sensitive() {
        assert_ne!(KeyPath::from("Host"), KeyPath::from("host"));
    }

    #[test]
    fn test_raw_value_display() {
        let mut map = BTreeMap::new();
        map.insert("port".to_string(), RawValue::Integer(5432));
        let raw = RawValue::Sequence(vec![
            RawValue::String("a".to_string()),
            RawValue::Mapping(map),
        ]);
        assert_eq!(raw.to_string(), "[a, {port: 5432}]");
    }

    #[test]
    fn test_raw_value_deserializes_from_toml() {
        let raw: RawValue = toml::from_str(
            r#"
[server]
host = "localhost"
port = 8080
ratio = 0.5
tags = ["a", "b"]
"#,
        )
        .unwrap();

        let RawValue::Mapping(root) = raw else {
            panic!("expected mapping at document root");
        };
        let RawValue::Mapping(server) = &root["server"] else {
            panic!("expected nested mapping");
        };
        assert_eq!(server["host"], RawValue::String("localhost".to_string()));
        assert_eq!(server["port"], RawValue::Integer(8080));
        assert_eq!(server["ratio"], RawValue::Float(0.5));
        assert_eq!(
            server["tags"],
            RawValue::Sequence(vec![
                RawValue::String("a".to_string()),
                RawValue::String("b".to_string())
            ])
        );
    }

    #[test]
    fn test_raw_value_deserializes_yaml_null() {
        let raw: RawValue = serde_yaml::from_str("key: null").unwrap();
        let RawValue::Mapping(root) = raw else {
            panic!("expected mapping at document root");
        };
        assert_eq!(root["key"], RawValue::Null);
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(Value::String("x".to_string()).type_name(), "string");
        assert_eq!(Value::Integer(1).type_name(), "integer");
        assert_eq!(Value::Opaque(RawValue::Null).type_name(), "opaque");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(42).as_int(), Some(42));
        assert_eq!(Value::Integer(42).as_str(), None);
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
    }
}
