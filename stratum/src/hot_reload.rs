//! # Live Reload
//!
//! Watches change-capable sources and re-resolves automatically.
//!
//! File sources are watched with the `notify` crate. Every source event,
//! regardless of which thread the source emits it from, is marshalled into a
//! single bounded trigger queue consumed by one task, so resolution passes
//! are never triggered re-entrantly from a source callback and at most one
//! runs at a time.

use crate::manager::ConfigManager;
use crate::source::SourceEvent;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Watch a file for changes and emit [`SourceEvent`]s.
///
/// Returns `None` when no tokio runtime is available or the file does not
/// exist yet; the source then simply has no change notifications. Creation,
/// modification and removal all emit [`SourceEvent::Changed`]: the follow-up
/// snapshot reflects whatever state the file is in.
pub(crate) fn watch_file(name: String, path: PathBuf) -> Option<mpsc::Receiver<SourceEvent>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("watching `{name}` requires a tokio runtime; change notifications disabled");
        return None;
    };

    if !path.exists() {
        warn!("cannot watch `{name}`: file not found: {path:?}");
        return None;
    }

    let (tx, rx) = mpsc::channel(100);

    runtime.spawn(async move {
        let (event_tx, mut event_rx) = mpsc::channel(100);
        let mut watcher = match RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                let error_msg = format!("failed to create file watcher: {e}");
                error!("{error_msg}");
                let _ = tx
                    .send(SourceEvent::Error {
                        source: name,
                        error: error_msg,
                    })
                    .await;
                return;
            }
        };

        if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
            let error_msg = format!("failed to watch config file: {e}");
            error!("{error_msg}");
            let _ = tx
                .send(SourceEvent::Error {
                    source: name,
                    error: error_msg,
                })
                .await;
            return;
        }

        info!("watching config file for `{name}`: {path:?}");

        let _ = tx.send(SourceEvent::Ready).await;

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("receiver dropped, stopping watcher for {path:?}");
                    break;
                }
                event_result = event_rx.recv() => {
                    let Some(event_result) = event_result else {
                        break;
                    };

                    match event_result {
                        Ok(event) => {
                            match event.kind {
                                EventKind::Create(_) | EventKind::Modify(_) => {
                                    info!("config file updated: {path:?}");
                                }
                                EventKind::Remove(_) => {
                                    warn!("config file removed: {path:?}");
                                }
                                other => {
                                    debug!("ignoring event: {other:?}");
                                    continue;
                                }
                            }

                            if tx.send(SourceEvent::Changed).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("watch error: {e}");
                        }
                    }
                }
            }
        }
    });

    Some(rx)
}

/// Handle over the watcher tasks spawned by [`spawn_watcher`]. Dropping it
/// stops watching; the manager itself stays fully usable.
pub struct WatchHandle {
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Subscribe to every watch-capable source of `manager` and reload on
/// change.
///
/// One forwarder task per source feeds a single bounded trigger queue; a
/// single consumer task performs the reloads, so source callbacks never run
/// a resolution pass directly. A failed automatic reload is logged and the
/// previous generation stays live.
///
/// Sources added after this call are not picked up; call again to refresh
/// the subscriptions. Must be called from within a tokio runtime.
pub fn spawn_watcher(manager: Arc<ConfigManager>) -> WatchHandle {
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<String>(32);
    let mut tasks = Vec::new();

    for source in manager.sources() {
        let Some(mut events) = source.watch() else {
            continue;
        };
        let name = source.name().to_string();
        let trigger = trigger_tx.clone();

        tasks.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SourceEvent::Ready => {
                        debug!("source `{name}` is being watched");
                    }
                    SourceEvent::Changed => {
                        if trigger.send(name.clone()).await.is_err() {
                            break;
                        }
                    }
                    SourceEvent::Error { source, error } => {
                        error!("watcher for source `{source}` failed: {error}");
                    }
                }
            }
        }));
    }
    drop(trigger_tx);

    tasks.push(tokio::spawn(async move {
        while let Some(name) = trigger_rx.recv().await {
            match manager.reload() {
                Ok(generation) => {
                    info!("reloaded configuration (generation {generation}) after change in `{name}`");
                }
                Err(e) => {
                    error!("reload after change in `{name}` failed: {e}");
                }
            }
        }
    }));

    WatchHandle { tasks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_source::FileSource;
    use crate::schema::{FieldType, Schema, SchemaField};
    use crate::source::{OverrideSource, Source};
    use crate::value::RawValue;
    use std::fs;
    use tempfile::tempdir;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_watch_file_emits_ready_then_changed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout = 30").unwrap();

        let source = FileSource::new(&path);
        let mut rx = source.watch().unwrap();

        let ready = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for Ready event")
            .expect("no event received");
        assert_eq!(ready, SourceEvent::Ready);

        fs::write(&path, "timeout = 45").unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for change event")
            .expect("no event received");
        assert_eq!(event, SourceEvent::Changed);
    }

    #[tokio::test]
    async fn test_watch_file_nonexistent_is_none() {
        let dir = tempdir().unwrap();
        let source = FileSource::new(dir.path().join("missing.toml"));
        assert!(source.watch().is_none());
    }

    #[tokio::test]
    async fn test_watch_file_removed_emits_changed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout = 30").unwrap();

        let source = FileSource::new(&path);
        let mut rx = source.watch().unwrap();

        let ready = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(ready, Some(SourceEvent::Ready));

        fs::remove_file(&path).unwrap();

        // Removal may surface as one or more events depending on platform.
        let event = timeout(Duration::from_secs(5), rx.recv()).await;
        if let Ok(Some(event)) = event {
            assert_eq!(event, SourceEvent::Changed);
        }
    }

    async fn wait_for_generation(manager: &ConfigManager, at_least: u64) {
        timeout(Duration::from_secs(5), async {
            loop {
                if manager.current_generation().unwrap_or(0) >= at_least {
                    break;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("timeout waiting for reload");
    }

    #[tokio::test]
    async fn test_file_change_triggers_automatic_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout = 30").unwrap();

        let schema = Schema::builder()
            .field(SchemaField::new("timeout", FieldType::Integer))
            .build();
        let manager = Arc::new(ConfigManager::new(
            schema,
            vec![Arc::new(FileSource::new(&path)) as Arc<dyn Source>],
        ));
        manager.reload().unwrap();
        assert_eq!(manager.get_int("timeout").unwrap(), 30);

        let _handle = spawn_watcher(manager.clone());
        // Let the watcher install before mutating the file.
        sleep(Duration::from_millis(100)).await;

        fs::write(&path, "timeout = 45").unwrap();

        wait_for_generation(&manager, 2).await;
        assert_eq!(manager.get_int("timeout").unwrap(), 45);
    }

    #[tokio::test]
    async fn test_override_change_triggers_automatic_reload() {
        let overrides = Arc::new(OverrideSource::new());
        let schema = Schema::builder()
            .field(SchemaField::new("timeout", FieldType::Integer).default_value(
                crate::value::Value::Integer(30),
            ))
            .build();
        let manager = Arc::new(ConfigManager::new(
            schema,
            vec![overrides.clone() as Arc<dyn Source>],
        ));
        manager.reload().unwrap();

        let _handle = spawn_watcher(manager.clone());
        sleep(Duration::from_millis(50)).await;

        overrides.set("timeout", RawValue::Integer(60));

        wait_for_generation(&manager, 2).await;
        assert_eq!(manager.get_int("timeout").unwrap(), 60);
    }

    #[tokio::test]
    async fn test_failed_automatic_reload_keeps_previous_generation() {
        let overrides = Arc::new(OverrideSource::new());
        let schema = Schema::builder()
            .field(SchemaField::new("timeout", FieldType::Integer).default_value(
                crate::value::Value::Integer(30),
            ))
            .build();
        let manager = Arc::new(ConfigManager::new(
            schema,
            vec![overrides.clone() as Arc<dyn Source>],
        ));
        manager.reload().unwrap();

        let _handle = spawn_watcher(manager.clone());
        sleep(Duration::from_millis(50)).await;

        overrides.set("timeout", RawValue::from("fast"));

        // The triggered reload fails; the old generation must survive.
        sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.current_generation(), Some(1));
        assert_eq!(manager.get_int("timeout").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_watching() {
        let overrides = Arc::new(OverrideSource::new());
        let manager = Arc::new(ConfigManager::new(
            Schema::empty(),
            vec![overrides.clone() as Arc<dyn Source>],
        ));
        manager.reload().unwrap();

        let handle = spawn_watcher(manager.clone());
        sleep(Duration::from_millis(50)).await;
        drop(handle);
        sleep(Duration::from_millis(50)).await;

        overrides.set("a", RawValue::Integer(1));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.current_generation(), Some(1));
    }
}
