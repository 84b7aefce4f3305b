//! # Configuration Schema
//!
//! Declares the expected shape of a resolved configuration: field paths,
//! declared types, defaults, required/optional status and validation rules.
//!
//! A schema is built once and is stateless afterwards. Nested configuration
//! is expressed with dotted paths in a flat field table, matching the
//! flattened `KeyPath -> RawValue` contract of the sources.

use crate::error::ResolveError;
use crate::value::{KeyPath, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// Homogeneous list with element-wise coercion.
    List(Box<FieldType>),
    /// Homogeneous string-keyed map with per-entry coercion.
    Map(Box<FieldType>),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Float => f.write_str("float"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::List(element) => write!(f, "list<{element}>"),
            FieldType::Map(element) => write!(f, "map<string, {element}>"),
        }
    }
}

type CustomCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A single validation rule. Rules run in declared order and every failing
/// rule is reported; validation never short-circuits.
#[derive(Clone)]
pub enum ValidatorRule {
    /// Numeric value must fall within `[min, max]` (inclusive).
    Range { min: f64, max: f64 },
    /// Minimum length of a string or list.
    MinLength(usize),
    /// Maximum length of a string or list.
    MaxLength(usize),
    /// String value must be one of the listed tokens.
    OneOf(Vec<String>),
    /// String value must match the pattern.
    Matches(Regex),
    /// Arbitrary predicate with a rule name for diagnostics.
    Custom { name: String, check: CustomCheck },
}

impl fmt::Debug for ValidatorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorRule::Range { min, max } => write!(f, "range({min}, {max})"),
            ValidatorRule::MinLength(n) => write!(f, "min_length({n})"),
            ValidatorRule::MaxLength(n) => write!(f, "max_length({n})"),
            ValidatorRule::OneOf(tokens) => write!(f, "one_of({tokens:?})"),
            ValidatorRule::Matches(pattern) => write!(f, "matches({pattern})"),
            ValidatorRule::Custom { name, .. } => write!(f, "custom({name})"),
        }
    }
}

impl ValidatorRule {
    /// Rule name carried in [`ResolveError::Validation`].
    pub fn name(&self) -> &str {
        match self {
            ValidatorRule::Range { .. } => "range",
            ValidatorRule::MinLength(_) => "min_length",
            ValidatorRule::MaxLength(_) => "max_length",
            ValidatorRule::OneOf(_) => "one_of",
            ValidatorRule::Matches(_) => "matches",
            ValidatorRule::Custom { name, .. } => name,
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            ValidatorRule::Range { min, max } => {
                let number = match value {
                    Value::Integer(i) => *i as f64,
                    Value::Float(x) => *x,
                    other => return Err(format!("range applies to numbers, found {}", other.type_name())),
                };
                if number < *min || number > *max {
                    Err(format!("{number} is outside {min}..={max}"))
                } else {
                    Ok(())
                }
            }
            ValidatorRule::MinLength(min) => match length_of(value) {
                Some(length) if length < *min => {
                    Err(format!("length {length} is below minimum {min}"))
                }
                Some(_) => Ok(()),
                None => Err(format!(
                    "length applies to strings and lists, found {}",
                    value.type_name()
                )),
            },
            ValidatorRule::MaxLength(max) => match length_of(value) {
                Some(length) if length > *max => {
                    Err(format!("length {length} exceeds maximum {max}"))
                }
                Some(_) => Ok(()),
                None => Err(format!(
                    "length applies to strings and lists, found {}",
                    value.type_name()
                )),
            },
            ValidatorRule::OneOf(tokens) => match value {
                Value::String(s) if tokens.iter().any(|t| t == s) => Ok(()),
                Value::String(s) => Err(format!("`{s}` is not one of {tokens:?}")),
                other => Err(format!("one_of applies to strings, found {}", other.type_name())),
            },
            ValidatorRule::Matches(pattern) => match value {
                Value::String(s) if pattern.is_match(s) => Ok(()),
                Value::String(s) => Err(format!("`{s}` does not match `{pattern}`")),
                other => Err(format!("matches applies to strings, found {}", other.type_name())),
            },
            ValidatorRule::Custom { check, .. } => check(value),
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        _ => None,
    }
}

/// Declaration of one configuration field.
#[derive(Debug, Clone)]
pub struct SchemaField {
    path: KeyPath,
    field_type: FieldType,
    default: Option<Value>,
    required: bool,
    secure: bool,
    description: Option<String>,
    validators: Vec<ValidatorRule>,
}

impl SchemaField {
    pub fn new(path: impl Into<KeyPath>, field_type: FieldType) -> Self {
        Self {
            path: path.into(),
            field_type,
            default: None,
            required: false,
            secure: false,
            description: None,
            validators: Vec::new(),
        }
    }

    /// Marks the field as required: it must be set by a source or carry a
    /// default, otherwise resolution fails with `MissingRequired`.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Default applied when no source defines the key. Defaults apply to
    /// *missing* keys only, never to values that failed coercion.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the value as sensitive: diagnostics output and merge logging
    /// render it as `***`.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Human description surfaced by `ConfigManager::describe`.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.validators.push(ValidatorRule::Range { min, max });
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.validators.push(ValidatorRule::MinLength(min));
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.validators.push(ValidatorRule::MaxLength(max));
        self
    }

    pub fn one_of<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validators
            .push(ValidatorRule::OneOf(tokens.into_iter().map(Into::into).collect()));
        self
    }

    pub fn matches(mut self, pattern: Regex) -> Self {
        self.validators.push(ValidatorRule::Matches(pattern));
        self
    }

    pub fn custom<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(ValidatorRule::Custom {
            name: name.into(),
            check: Arc::new(check),
        });
        self
    }

    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// The full set of declared fields. Stateless once built.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<KeyPath, SchemaField>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder { fields: Vec::new() }
    }

    /// An empty schema: every key is unknown and handled by the resolver's
    /// unknown-key policy.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn field(&self, path: &KeyPath) -> Option<&SchemaField> {
        self.fields.get(path)
    }

    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    pub fn default_for(&self, path: &KeyPath) -> Option<&Value> {
        self.fields.get(path).and_then(SchemaField::default)
    }

    pub fn is_secure(&self, path: &KeyPath) -> bool {
        self.fields.get(path).is_some_and(SchemaField::is_secure)
    }

    /// Runs every validator declared for `path` against `value`, collecting
    /// all failures. Paths without a schema entry validate vacuously.
    pub fn validate(&self, path: &KeyPath, value: &Value) -> Vec<ResolveError> {
        let Some(field) = self.fields.get(path) else {
            return Vec::new();
        };

        field
            .validators
            .iter()
            .filter_map(|rule| {
                rule.check(value).err().map(|message| ResolveError::Validation {
                    path: path.clone(),
                    rule: rule.name().to_string(),
                    message,
                })
            })
            .collect()
    }
}

/// Builder for [`Schema`]. Declaring the same path twice keeps the last
/// declaration.
pub struct SchemaBuilder {
    fields: Vec<SchemaField>,
}

impl SchemaBuilder {
    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Schema {
        let mut fields = BTreeMap::new();
        for field in self.fields {
            fields.insert(field.path.clone(), field);
        }
        Schema { fields }
    }
}
