//! # Configuration Manager
//!
//! Holds the current resolved configuration, orchestrates re-resolution and
//! exposes thread-safe read access plus change subscriptions.
//!
//! # Concurrency
//! - `get` and friends take a read lock only long enough to clone an `Arc`
//!   to the current generation; readers never observe a partially merged
//!   state and never block on a reload.
//! - Resolution passes are serialized by a dedicated mutex. Concurrent
//!   `reload` calls queue and run sequentially; `reload_with_timeout` bounds
//!   the wait and leaves the in-flight pass running.
//! - Publishing is an atomic `Arc` swap; a failed pass leaves the previous
//!   generation untouched (fail-static).
//! - Listeners run after the swap with the reload mutex already released,
//!   outside every lock. A slow listener stalls neither readers nor queued
//!   reloads, and a listener may itself trigger a reload.

use crate::error::ConfigError;
use crate::resolver::{resolve, ResolvedConfig, ResolverOptions};
use crate::schema::Schema;
use crate::source::Source;
use crate::value::{KeyPath, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Listener = Arc<dyn Fn(u64) + Send + Sync>;

/// Handle returned by [`ConfigManager::on_change`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// One row of [`ConfigManager::describe`] output: a declared field and its
/// current state, with secure values masked.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub path: KeyPath,
    pub description: Option<String>,
    pub field_type: String,
    pub default: Option<String>,
    pub required: bool,
    pub secure: bool,
    /// Contributing source for the current generation, if the key resolved.
    pub source: Option<String>,
    /// Current value rendered for display; `***` for secure fields.
    pub value: Option<String>,
}

/// Thread-safe owner of the resolved configuration.
///
/// Starts uninitialized; the first successful [`reload`](Self::reload)
/// publishes generation 1 and every later success increments it. A failed
/// reload surfaces the error to its caller only: state is unchanged and
/// listeners are not invoked.
pub struct ConfigManager {
    schema: Schema,
    options: ResolverOptions,
    sources: RwLock<Vec<Arc<dyn Source>>>,
    current: RwLock<Option<Arc<ResolvedConfig>>>,
    reload_lock: Mutex<()>,
    generation: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

impl ConfigManager {
    /// Manager over `sources` (in registration order) with default resolver
    /// options. No resolution happens until the first `reload`.
    pub fn new(schema: Schema, sources: Vec<Arc<dyn Source>>) -> Self {
        Self::with_options(schema, sources, ResolverOptions::default())
    }

    pub fn with_options(
        schema: Schema,
        sources: Vec<Arc<dyn Source>>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            schema,
            options,
            sources: RwLock::new(sources),
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// The current generation's snapshot. Cheap: one read lock, one `Arc`
    /// clone. `None` before the first successful reload.
    pub fn snapshot(&self) -> Option<Arc<ResolvedConfig>> {
        self.current.read().clone()
    }

    /// Value at `path` in the current generation.
    pub fn get(&self, path: impl Into<KeyPath>) -> Result<Value, ConfigError> {
        let path = path.into();
        let snapshot = self.snapshot().ok_or(ConfigError::NotResolved)?;
        snapshot
            .get(&path)
            .cloned()
            .ok_or(ConfigError::KeyNotFound { path })
    }

    /// String value at `path`; `TypeMismatch` if the stored type disagrees.
    pub fn get_str(&self, path: impl Into<KeyPath>) -> Result<String, ConfigError> {
        let path = path.into();
        match self.get(path.clone())? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(path, "string", &other)),
        }
    }

    /// Integer value at `path`; `TypeMismatch` if the stored type disagrees.
    pub fn get_int(&self, path: impl Into<KeyPath>) -> Result<i64, ConfigError> {
        let path = path.into();
        match self.get(path.clone())? {
            Value::Integer(i) => Ok(i),
            other => Err(mismatch(path, "integer", &other)),
        }
    }

    /// Float value at `path`; `TypeMismatch` if the stored type disagrees.
    pub fn get_float(&self, path: impl Into<KeyPath>) -> Result<f64, ConfigError> {
        let path = path.into();
        match self.get(path.clone())? {
            Value::Float(x) => Ok(x),
            other => Err(mismatch(path, "float", &other)),
        }
    }

    /// Boolean value at `path`; `TypeMismatch` if the stored type disagrees.
    pub fn get_bool(&self, path: impl Into<KeyPath>) -> Result<bool, ConfigError> {
        let path = path.into();
        match self.get(path.clone())? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(path, "boolean", &other)),
        }
    }

    /// Flattened view of every key in the current generation.
    pub fn get_all(&self) -> Result<BTreeMap<KeyPath, Value>, ConfigError> {
        let snapshot = self.snapshot().ok_or(ConfigError::NotResolved)?;
        Ok(snapshot.values().clone())
    }

    /// Which source contributed `path` in the current generation.
    pub fn origin_of(&self, path: impl Into<KeyPath>) -> Result<String, ConfigError> {
        let path = path.into();
        let snapshot = self.snapshot().ok_or(ConfigError::NotResolved)?;
        snapshot
            .origin_of(&path)
            .map(str::to_string)
            .ok_or(ConfigError::KeyNotFound { path })
    }

    /// Generation of the currently published snapshot, if any.
    pub fn current_generation(&self) -> Option<u64> {
        self.snapshot().map(|s| s.generation())
    }

    /// Runs one resolution pass and publishes on success, returning the new
    /// generation number. Passes are serialized; concurrent callers queue.
    pub fn reload(&self) -> Result<u64, ConfigError> {
        let generation = {
            let _guard = self.reload_lock.lock();
            self.run_pass()?
        };
        self.notify(generation);
        Ok(generation)
    }

    /// Like [`reload`](Self::reload), but waits at most `timeout` for an
    /// in-flight pass to finish. On timeout the in-flight pass continues
    /// (and may still publish); only this caller gets `ReloadTimeout`.
    pub fn reload_with_timeout(&self, timeout: Duration) -> Result<u64, ConfigError> {
        let generation = {
            let Some(_guard) = self.reload_lock.try_lock_for(timeout) else {
                return Err(ConfigError::ReloadTimeout);
            };
            self.run_pass()?
        };
        self.notify(generation);
        Ok(generation)
    }

    fn run_pass(&self) -> Result<u64, ConfigError> {
        let sources = self.sources.read().clone();
        let generation = self.generation.load(Ordering::Acquire) + 1;

        let resolved = resolve(&sources, &self.schema, &self.options, generation)?;

        *self.current.write() = Some(Arc::new(resolved));
        self.generation.store(generation, Ordering::Release);

        Ok(generation)
    }

    fn notify(&self, generation: u64) {
        // Callers invoke this after releasing the reload mutex. Clone the
        // handles first so user callbacks run without any manager lock held;
        // a listener may unregister itself, trigger reads or reload.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(generation);
        }
    }

    /// Registers a callback invoked with the new generation number after
    /// every successful publish. Never invoked on a failed reload.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Unregisters a listener; a no-op for unknown ids.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().retain(|(listener_id, _)| *listener_id != id);
    }

    /// Appends a source and triggers an immediate reload.
    pub fn add_source(&self, source: Arc<dyn Source>) -> Result<u64, ConfigError> {
        self.sources.write().push(source);
        self.reload()
    }

    /// Removes the named source and triggers an immediate reload. The list
    /// mutation persists even if that reload fails; fail-static covers the
    /// resolved state only.
    pub fn remove_source(&self, name: &str) -> Result<u64, ConfigError> {
        {
            let mut sources = self.sources.write();
            let Some(index) = sources.iter().position(|s| s.name() == name) else {
                return Err(ConfigError::SourceNotFound {
                    name: name.to_string(),
                });
            };
            sources.remove(index);
        }
        self.reload()
    }

    pub(crate) fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.sources.read().clone()
    }

    /// Inventory of every declared field with its current state. Secure
    /// values (and their defaults) are rendered as `***`.
    pub fn describe(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        let snapshot = self.snapshot().ok_or(ConfigError::NotResolved)?;

        Ok(self
            .schema
            .fields()
            .map(|field| {
                let secure = field.is_secure();
                ConfigEntry {
                    path: field.path().clone(),
                    description: field.description_text().map(str::to_string),
                    field_type: field.field_type().to_string(),
                    default: field.default().map(|v| mask_secure(v.to_string(), secure)),
                    required: field.is_required(),
                    secure,
                    source: snapshot.origin_of(field.path()).map(str::to_string),
                    value: snapshot
                        .get(field.path())
                        .map(|v| mask_secure(v.to_string(), secure)),
                }
            })
            .collect())
    }
}

fn mismatch(path: KeyPath, expected: &'static str, actual: &Value) -> ConfigError {
    ConfigError::TypeMismatch {
        path,
        expected,
        actual: actual.type_name(),
    }
}

fn mask_secure(rendered: String, secure: bool) -> String {
    if secure {
        "***".to_string()
    } else {
        rendered
    }
}
