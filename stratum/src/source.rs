//! # Configuration Sources
//!
//! A source supplies raw key/value pairs with a priority tier. The resolver
//! treats every source uniformly through the [`Source`] trait; concrete
//! variants differ only in how they produce their snapshot.
//!
//! Priority tiers are plain integers and higher wins. When two sources share
//! a tier, the one registered later wins for overlapping keys.

use crate::error::SourceError;
use crate::value::{KeyPath, RawValue};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Conventional priority tiers. Any integer is a valid priority; these are
/// the defaults used by the concrete sources.
pub mod priority {
    pub const DEFAULTS: i32 = 0;
    pub const FILE: i32 = 100;
    pub const ENVIRONMENT: i32 = 200;
    pub const OVERRIDE: i32 = 300;
}

/// Change notification emitted by a watch-capable source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// The watcher is installed and events will follow.
    Ready,

    /// The source's snapshot may have changed; a reload is warranted.
    Changed,

    /// The watcher failed; no further events will arrive.
    Error { source: String, error: String },
}

/// Provider of raw configuration key/value pairs.
///
/// `snapshot` must be side-effect-free and must not block indefinitely: the
/// shipped variants only perform bounded local reads (process environment,
/// one file). A failed snapshot is aggregated into the resolution error
/// rather than aborting the pass.
pub trait Source: Send + Sync {
    /// Unique name, used in provenance manifests, logs and `remove_source`.
    fn name(&self) -> &str;

    /// Priority tier; higher wins.
    fn priority(&self) -> i32;

    /// A fresh, independent read of the source's current key/value pairs.
    fn snapshot(&self) -> Result<BTreeMap<KeyPath, RawValue>, SourceError>;

    /// Change-notification channel, or `None` when the source cannot signal
    /// changes. Called once per watcher; events are marshalled into a single
    /// reload-trigger queue by the manager.
    fn watch(&self) -> Option<mpsc::Receiver<SourceEvent>> {
        None
    }
}

/// Static lowest-tier source holding application defaults.
///
/// Distinct from schema defaults: a `DefaultSource` participates in
/// precedence like any other source, while schema defaults apply only when
/// no source defines the key at all.
pub struct DefaultSource {
    name: String,
    priority: i32,
    entries: BTreeMap<KeyPath, RawValue>,
}

impl DefaultSource {
    pub fn new(entries: BTreeMap<KeyPath, RawValue>) -> Self {
        Self {
            name: "defaults".to_string(),
            priority: priority::DEFAULTS,
            entries,
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
}

impl Source for DefaultSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn snapshot(&self) -> Result<BTreeMap<KeyPath, RawValue>, SourceError> {
        Ok(self.entries.clone())
    }
}

/// Programmatic runtime overrides, conventionally the highest tier.
///
/// Interior-mutable: `set`/`unset` may be called at any time from any
/// thread. When watched, every mutation emits [`SourceEvent::Changed`]
/// (best-effort: if the channel is full the event is dropped, which is
/// harmless because a queued reload snapshots the latest state anyway).
pub struct OverrideSource {
    name: String,
    priority: i32,
    entries: RwLock<BTreeMap<KeyPath, RawValue>>,
    events: RwLock<Option<mpsc::Sender<SourceEvent>>>,
}

impl OverrideSource {
    pub fn new() -> Self {
        Self {
            name: "overrides".to_string(),
            priority: priority::OVERRIDE,
            entries: RwLock::new(BTreeMap::new()),
            events: RwLock::new(None),
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

    /// Sets or replaces one override.
    pub fn set(&self, path: impl Into<KeyPath>, value: impl Into<RawValue>) {
        self.entries.write().insert(path.into(), value.into());
        self.emit_changed();
    }

    /// Removes one override; a no-op for unknown paths.
    pub fn unset(&self, path: &KeyPath) {
        if self.entries.write().remove(path).is_some() {
            self.emit_changed();
        }
    }

    fn emit_changed(&self) {
        if let Some(sender) = self.events.read().as_ref() {
            if let Err(e) = sender.try_send(SourceEvent::Changed) {
                debug!("dropping override change event: {e}");
            }
        }
    }
}

impl Default for OverrideSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for OverrideSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn snapshot(&self) -> Result<BTreeMap<KeyPath, RawValue>, SourceError> {
        Ok(self.entries.read().clone())
    }

    fn watch(&self) -> Option<mpsc::Receiver<SourceEvent>> {
        let (tx, rx) = mpsc::channel(16);
        *self.events.write() = Some(tx);
        Some(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_snapshot() {
        let mut entries = BTreeMap::new();
        entries.insert(KeyPath::from("db.host"), RawValue::from("localhost"));
        let source = DefaultSource::new(entries);

        assert_eq!(source.name(), "defaults");
        assert_eq!(source.priority(), priority::DEFAULTS);
        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot[&KeyPath::from("db.host")], RawValue::from("localhost"));
    }

    #[test]
    fn test_default_source_watch_not_supported() {
        let source = DefaultSource::new(BTreeMap::new());
        assert!(source.watch().is_none());
    }

    #[test]
    fn test_override_source_set_unset() {
        let source = OverrideSource::new();
        source.set("timeout", RawValue::Integer(45));
        assert_eq!(
            source.snapshot().unwrap()[&KeyPath::from("timeout")],
            RawValue::Integer(45)
        );

        source.unset(&KeyPath::from("timeout"));
        assert!(source.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_override_source_snapshot_is_independent() {
        let source = OverrideSource::new();
        source.set("a", RawValue::Integer(1));
        let snapshot = source.snapshot().unwrap();
        source.set("a", RawValue::Integer(2));
        assert_eq!(snapshot[&KeyPath::from("a")], RawValue::Integer(1));
    }

    #[tokio::test]
    async fn test_override_source_emits_change_events() {
        let source = OverrideSource::new();
        let mut rx = source.watch().unwrap();

        source.set("debug", RawValue::Bool(true));
        assert_eq!(rx.recv().await, Some(SourceEvent::Changed));

        source.unset(&KeyPath::from("debug"));
        assert_eq!(rx.recv().await, Some(SourceEvent::Changed));
    }

    #[tokio::test]
    async fn test_override_source_unset_unknown_is_silent() {
        let source = OverrideSource::new();
        let mut rx = source.watch().unwrap();
        source.unset(&KeyPath::from("nope"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_named_and_priority_builders() {
        let source = OverrideSource::new().named("cli").with_priority(500);
        assert_eq!(source.name(), "cli");
        assert_eq!(source.priority(), 500);
    }
}
