//! # Environment Source
//!
//! Reads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! Variables are selected by prefix and mapped to key paths: the prefix is
//! stripped, a double underscore becomes a path separator and the remainder
//! is lowercased. With prefix `APP_`:
//!
//! - `APP_DB__PORT` -> `db.port`
//! - `APP_LOG_LEVEL` -> `log_level`
//!
//! Every value is produced as a raw string; the coercer types it against the
//! schema.

use crate::error::SourceError;
use crate::source::{priority, Source};
use crate::value::{KeyPath, RawValue};
use std::collections::BTreeMap;
use std::env;

/// Environment-variable backed source.
pub struct EnvSource {
    name: String,
    prefix: String,
    priority: i32,
}

impl EnvSource {
    /// Source over all variables starting with `prefix` (e.g. `"APP_"`).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            name: "env".to_string(),
            prefix: prefix.into(),
            priority: priority::ENVIRONMENT,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn key_path(&self, var: &str) -> Option<KeyPath> {
        let stripped = var.strip_prefix(&self.prefix)?;
        if stripped.is_empty() {
            return None;
        }
        Some(KeyPath::new(stripped.replace("__", ".").to_lowercase()))
    }
}

impl Source for EnvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn snapshot(&self) -> Result<BTreeMap<KeyPath, RawValue>, SourceError> {
        let mut entries = BTreeMap::new();
        for (var, value) in env::vars() {
            if let Some(path) = self.key_path(&var) {
                entries.insert(path, RawValue::String(value));
            }
        }
        Ok(entries)
    }
}
