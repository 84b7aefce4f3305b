//! # File Source
//!
//! Loads configuration from TOML, YAML or JSON files.
//!
//! The format is auto-detected from the file extension. The parsed document
//! must be a mapping at the root; nested mappings extend the key path and
//! everything else (scalars and sequences) is a leaf value.

use crate::error::SourceError;
use crate::hot_reload;
use crate::source::{priority, Source, SourceEvent};
use crate::value::{KeyPath, RawValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Parse a configuration file into a raw value tree, detecting the format
/// from the extension.
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml` / `.yml`: YAML format
/// - `.json`: JSON format
pub fn load_raw(path: &Path) -> Result<RawValue, SourceError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(SourceError::NoExtension)?;

    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SourceError::FileNotFound(path.display().to_string())
        } else {
            SourceError::Io(e)
        }
    })?;

    match extension.to_lowercase().as_str() {
        "toml" => toml::from_str(&contents).map_err(|e| SourceError::TomlParse(e.to_string())),
        "yaml" | "yml" => {
            serde_yaml::from_str(&contents).map_err(|e| SourceError::YamlParse(e.to_string()))
        }
        "json" => {
            serde_json::from_str(&contents).map_err(|e| SourceError::JsonParse(e.to_string()))
        }
        other => Err(SourceError::UnsupportedFormat(other.to_string())),
    }
}

/// Flatten a document into `KeyPath -> RawValue` leaves. Nested mappings
/// extend the path; sequences and scalars are leaves.
pub fn flatten(root: &RawValue) -> Result<BTreeMap<KeyPath, RawValue>, SourceError> {
    let RawValue::Mapping(entries) = root else {
        return Err(SourceError::RootNotMapping(root.type_name()));
    };

    let mut flat = BTreeMap::new();
    flatten_into(&KeyPath::new(""), entries, &mut flat);
    Ok(flat)
}

fn flatten_into(
    prefix: &KeyPath,
    entries: &BTreeMap<String, RawValue>,
    out: &mut BTreeMap<KeyPath, RawValue>,
) {
    for (key, value) in entries {
        let path = prefix.join(key);
        match value {
            RawValue::Mapping(nested) => flatten_into(&path, nested, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// File-backed source with format auto-detection and optional live watching.
pub struct FileSource {
    name: String,
    path: PathBuf,
    priority: i32,
    missing_ok: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "file".to_string(),
            path: path.into(),
            priority: priority::FILE,
            missing_ok: false,
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

    /// Treat a non-existent file as an empty snapshot instead of an error.
    /// For optional configuration files.
    pub fn missing_ok(mut self) -> Self {
        self.missing_ok = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn snapshot(&self) -> Result<BTreeMap<KeyPath, RawValue>, SourceError> {
        if self.missing_ok && !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        flatten(&load_raw(&self.path)?)
    }

    fn watch(&self) -> Option<mpsc::Receiver<SourceEvent>> {
        hot_reload::watch_file(self.name.clone(), self.path.clone())
    }
}
