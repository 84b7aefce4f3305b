//! # Stratum
//!
//! Layered configuration resolution engine.
//!
//! This crate provides:
//! - A [`Source`] abstraction over configuration providers (defaults, files,
//!   environment variables, runtime overrides), each with a priority tier
//! - Deterministic precedence merging: per key, the highest-priority source
//!   wins; equal tiers fall back to "last registered wins"
//! - Total type coercion of raw values against a declared [`Schema`], with
//!   validation rules (range, length, enum, regex, custom)
//! - Full error aggregation: one resolution pass reports every coercion
//!   failure, validation failure and missing required field together
//! - A thread-safe [`ConfigManager`] with lock-cheap reads, serialized
//!   fail-static reloads, change listeners and provenance diagnostics
//! - Optional live reload driven by `notify` file watching
//!
//! # Best Practices
//!
//! - A failed reload never touches the live configuration (fail-static)
//! - Published snapshots are immutable; readers holding one keep a complete,
//!   internally consistent generation
//! - Secure fields are masked as `***` in logs and diagnostics

pub mod coerce;
pub mod env_source;
pub mod error;
pub mod file_source;
pub mod hot_reload;
pub mod manager;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod value;

pub use coerce::coerce;
pub use env_source::EnvSource;
pub use error::{ConfigError, ResolutionError, ResolveError, SourceError};
pub use file_source::FileSource;
pub use hot_reload::{spawn_watcher, WatchHandle};
pub use manager::{ConfigEntry, ConfigManager, ListenerId};
pub use resolver::{resolve, ResolvedConfig, ResolverOptions, UnknownKeys};
pub use schema::{FieldType, Schema, SchemaField, ValidatorRule};
pub use source::{priority, DefaultSource, OverrideSource, Source, SourceEvent};
pub use value::{KeyPath, RawValue, Value};
