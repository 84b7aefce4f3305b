//! # Configuration Resolution
//!
//! Merges an ordered list of sources according to precedence, applies the
//! coercer and the schema, and produces an immutable [`ResolvedConfig`]
//! snapshot.
//!
//! # Precedence
//! For each key the raw value comes from the highest-priority source that
//! defines it. When two sources share a priority tier, the source registered
//! later wins for overlapping keys. Keys no source defines fall back to the
//! schema default, if declared.
//!
//! # Error policy
//! All per-key problems of one pass (coercion failures, validation failures,
//! missing required fields, failed source snapshots) are aggregated into a
//! single [`ResolutionError`]; resolution never stops at the first problem
//! and never publishes a partial result.

use crate::coerce::coerce;
use crate::error::{ResolutionError, ResolveError};
use crate::schema::Schema;
use crate::source::Source;
use crate::value::{KeyPath, RawValue, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Policy for keys present in a source but absent from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Store the raw value untouched as [`Value::Opaque`].
    #[default]
    Passthrough,
    /// Store as opaque, logging a warning per key.
    Warn,
    /// Fail resolution with [`ResolveError::UnknownKey`].
    Reject,
}

/// Resolution tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub unknown_keys: UnknownKeys,
}

/// Immutable result of one successful resolution pass.
///
/// Carries the typed values, the generation number and a provenance manifest
/// naming which source contributed each key (`"default"` for schema
/// defaults). Published snapshots are never mutated; a reload produces a new
/// generation instead.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    values: BTreeMap<KeyPath, Value>,
    provenance: BTreeMap<KeyPath, String>,
    generation: u64,
}

impl ResolvedConfig {
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        self.values.get(path)
    }

    pub fn values(&self) -> &BTreeMap<KeyPath, Value> {
        &self.values
    }

    /// Name of the source that contributed `path`, or `"default"` when the
    /// schema default applied.
    pub fn origin_of(&self, path: &KeyPath) -> Option<&str> {
        self.provenance.get(path).map(String::as_str)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Origin name recorded for values supplied by a schema default.
pub const DEFAULT_ORIGIN: &str = "default";

/// Resolve `sources` against `schema` into a new configuration generation.
///
/// Implements the full pass: independent snapshots, priority selection with
/// the last-registered tie-break, schema defaults for missing keys, coercion
/// of schema-typed keys, the unknown-key policy for the rest, and ordered
/// validation with full error aggregation.
pub fn resolve(
    sources: &[Arc<dyn Source>],
    schema: &Schema,
    options: &ResolverOptions,
    generation: u64,
) -> Result<ResolvedConfig, ResolutionError> {
    let mut errors: Vec<ResolveError> = Vec::new();

    // 1. Independent snapshot per source; a failed snapshot joins the
    //    aggregate instead of aborting the pass.
    let mut snapshots: Vec<(String, i32, BTreeMap<KeyPath, RawValue>)> = Vec::new();
    for source in sources {
        match source.snapshot() {
            Ok(entries) => snapshots.push((source.name().to_string(), source.priority(), entries)),
            Err(e) => errors.push(ResolveError::Source {
                name: source.name().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    // 2./3. Per key, select the winning snapshot. Scanning in registration
    //    order and replacing on `>=` makes the later registration win ties.
    let mut selected: BTreeMap<&KeyPath, usize> = BTreeMap::new();
    for (index, (_, priority, entries)) in snapshots.iter().enumerate() {
        for key in entries.keys() {
            let replace = match selected.get(key) {
                Some(&current) => *priority >= snapshots[current].1,
                None => true,
            };
            if replace {
                selected.insert(key, index);
            }
        }
    }

    // 4. Coerce schema-typed keys; route unknown keys through the policy.
    let mut values: BTreeMap<KeyPath, Value> = BTreeMap::new();
    let mut provenance: BTreeMap<KeyPath, String> = BTreeMap::new();
    let mut contributions: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (&key, &index) in &selected {
        let (source_name, _, entries) = &snapshots[index];
        let raw = &entries[key];

        let value = match schema.field(key) {
            Some(field) => match coerce(key, raw, field.field_type()) {
                Ok(value) => value,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            },
            None => match options.unknown_keys {
                UnknownKeys::Passthrough => Value::Opaque(raw.clone()),
                UnknownKeys::Warn => {
                    warn!("unknown configuration key `{key}` from source `{source_name}`");
                    Value::Opaque(raw.clone())
                }
                UnknownKeys::Reject => {
                    errors.push(ResolveError::UnknownKey {
                        path: key.clone(),
                        origin: source_name.clone(),
                    });
                    continue;
                }
            },
        };

        contributions
            .entry(source_name.clone())
            .or_default()
            .push(format!("{key} = {}", render_masked(schema, key, &value)));
        values.insert(key.clone(), value);
        provenance.insert(key.clone(), source_name.clone());
    }

    // Schema defaults and required-field enforcement. A key that was present
    // but failed coercion is invalid, not missing: no default substitution,
    // no MissingRequired on top of the coercion error.
    for field in schema.fields() {
        if selected.contains_key(field.path()) {
            continue;
        }
        if let Some(default) = field.default() {
            values.insert(field.path().clone(), default.clone());
            provenance.insert(field.path().clone(), DEFAULT_ORIGIN.to_string());
        } else if field.is_required() {
            errors.push(ResolveError::MissingRequired {
                path: field.path().clone(),
            });
        }
    }

    // 5. Validate every present or defaulted schema field, collecting all
    //    failures.
    for field in schema.fields() {
        if let Some(value) = values.get(field.path()) {
            errors.extend(schema.validate(field.path(), value));
        }
    }

    // 6./7. All-or-nothing publish.
    if !errors.is_empty() {
        return Err(ResolutionError::new(errors));
    }

    for (source_name, changes) in &contributions {
        info!("configuration from {source_name}: {changes:?}");
    }

    Ok(ResolvedConfig {
        values,
        provenance,
        generation,
    })
}

fn render_masked(schema: &Schema, path: &KeyPath, value: &Value) -> String {
    if schema.is_secure(path) {
        "***".to_string()
    } else {
        value.to_string()
    }
}
