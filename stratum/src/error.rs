//! # Error Taxonomy
//!
//! Structured errors for the resolution engine.
//!
//! - Uses `thiserror` for structured error definitions
//! - Per-key resolution problems are collected into one [`ResolutionError`]
//!   so a caller can fix every problem in a single iteration
//! - A failed resolution never replaces live state (fail-static)

use crate::schema::FieldType;
use crate::value::KeyPath;
use std::fmt;
use thiserror::Error;

/// A single per-key problem found during one resolution pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// A raw value could not be converted to the declared type.
    #[error("{path}: cannot coerce `{raw}` to {target}: {reason}")]
    Coercion {
        path: KeyPath,
        raw: String,
        target: FieldType,
        reason: String,
    },

    /// A coerced value failed a schema validator.
    #[error("{path}: rule `{rule}` failed: {message}")]
    Validation {
        path: KeyPath,
        rule: String,
        message: String,
    },

    /// A required field is absent from every source and has no default.
    #[error("{path}: required key is not set by any source and has no default")]
    MissingRequired { path: KeyPath },

    /// A source failed to produce its snapshot.
    #[error("source `{name}`: {reason}")]
    Source { name: String, reason: String },

    /// A key without a schema entry, under the rejecting unknown-key policy.
    /// `origin` names the contributing source. (Not `source`: thiserror
    /// reserves that field name for the error cause chain.)
    #[error("{path}: unknown key (provided by source `{origin}`)")]
    UnknownKey { path: KeyPath, origin: String },
}

impl ResolveError {
    /// The key path this error is about, if it concerns a single key.
    pub fn path(&self) -> Option<&KeyPath> {
        match self {
            ResolveError::Coercion { path, .. }
            | ResolveError::Validation { path, .. }
            | ResolveError::MissingRequired { path }
            | ResolveError::UnknownKey { path, .. } => Some(path),
            ResolveError::Source { .. } => None,
        }
    }
}

/// Aggregate of every [`ResolveError`] found during one resolution pass.
///
/// Resolution never short-circuits: all coercion failures, validation
/// failures and missing required fields are reported together.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionError {
    pub errors: Vec<ResolveError>,
}

impl ResolutionError {
    pub fn new(errors: Vec<ResolveError>) -> Self {
        Self { errors }
    }
}

impl std::error::Error for ResolutionError {}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "configuration resolution failed with {} issue(s):",
            self.errors.len()
        )?;
        for error in &self.errors {
            writeln!(f, "  - {error}")?;
        }
        Ok(())
    }
}

/// Errors surfaced by the [`ConfigManager`](crate::manager::ConfigManager)
/// read and administrative APIs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A resolution pass failed; the previous generation (if any) is intact.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The requested key does not exist in the current generation.
    #[error("key not found: {path}")]
    KeyNotFound { path: KeyPath },

    /// A typed accessor was used on a value of a different type.
    #[error("{path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: KeyPath,
        expected: &'static str,
        actual: &'static str,
    },

    /// `reload_with_timeout` could not acquire the reload slot in time.
    /// The in-flight pass continues and may still publish.
    #[error("timed out waiting for an in-flight reload to finish")]
    ReloadTimeout,

    /// Read access was attempted before the first successful resolution.
    #[error("configuration has not been resolved yet; call reload() first")]
    NotResolved,

    /// `remove_source` named a source that is not registered.
    #[error("source not found: {name}")]
    SourceNotFound { name: String },
}

/// Errors producing a snapshot from a concrete source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("failed to parse JSON: {0}")]
    JsonParse(String),

    #[error("config file has no extension")]
    NoExtension,

    #[error("unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("config file root must be a mapping, found {0}")]
    RootNotMapping(&'static str),
}
