//! Configuration file watching using the notify crate for cross-platform
//! support.
//!
//! The watch is on the directory containing the config file, not the file
//! itself, so deletion/rename followed by re-creation keeps being observed.
//! Reload attempts are debounced against the last successful reload and
//! delayed briefly so the writing process can finish flushing.

use crate::config::{ConfigStore, ServerConfig};
use crate::error::{Error, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Events arriving within this window of the last successful reload are dropped.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Grace period before re-reading, so the writer can finish flushing.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Start watching the store's config file and reload on external edits.
///
/// A terminal watcher failure ends the task (hot reload is disabled for the
/// rest of the process) but never takes the server down.
pub fn spawn_config_watcher(
    store: Arc<ConfigStore>,
    bound: ServerConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<tokio::task::JoinHandle<()>> {
    let config_path = store.path().to_path_buf();
    let file_name = config_path
        .file_name()
        .ok_or_else(|| Error::Watch(format!("config path has no filename: {}", config_path.display())))?
        .to_os_string();
    let watch_dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    let (tx, mut rx) = mpsc::channel::<notify::Event>(16);

    // The notify callback runs on the watcher's own thread.
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let _ = tx.blocking_send(event);
            },
            Err(e) => error!("watcher error: {}", e),
        }
    })
    .map_err(|e| Error::Watch(e.to_string()))?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Watch(e.to_string()))?;

    info!(dir = %watch_dir.display(), file = %config_path.display(), "config watcher started");

    let handle = tokio::spawn(async move {
        // Dropping the watcher stops the notify thread.
        let _watcher = watcher;
        let mut last_reload: Option<Instant> = None;

        loop {
            let event = tokio::select! {
                _ = shutdown.recv() => break,
                maybe = rx.recv() => match maybe {
                    Some(event) => event,
                    // Watcher thread is gone: hot reload stays off.
                    None => {
                        warn!("watch channel closed, hot reload disabled");
                        break;
                    },
                },
            };

            if !event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()))
            {
                continue;
            }

            match event.kind {
                // A rename landing on the config name is how atomic writers
                // (including our own persist) create the file.
                EventKind::Create(_)
                | EventKind::Modify(ModifyKind::Data(_))
                | EventKind::Modify(ModifyKind::Any)
                | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {},
                EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
                    debug!(kind = ?event.kind, "ignoring remove/rename of config file");
                    continue;
                },
                _ => continue,
            }

            if let Some(last) = last_reload {
                if last.elapsed() < DEBOUNCE_WINDOW {
                    debug!("dropping config event inside debounce window");
                    continue;
                }
            }

            tokio::time::sleep(SETTLE_DELAY).await;

            match store.load().await {
                Ok(config) => {
                    last_reload = Some(Instant::now());
                    info!("configuration reloaded from disk");
                    if config.server.host != bound.host || config.server.port != bound.port {
                        warn!(
                            configured = %format!("{}:{}", config.server.host, config.server.port),
                            bound = %format!("{}:{}", bound.host, bound.port),
                            "listen address changed in reloaded config; listener keeps the original binding"
                        );
                    }
                },
                Err(e) => error!("config reload failed: {}", e),
            }
        }

        debug!("config watcher stopped");
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EndpointConfig};
    use crate::observer::ObserverHub;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_external_edit_triggers_reload() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(
            dir.path().join("config.json"),
            Arc::new(ObserverHub::new()),
        ));
        let initial = store.load().await.unwrap();

        let (shutdown_tx, _) = broadcast::channel(1);
        let _handle =
            spawn_config_watcher(store.clone(), initial.server.clone(), shutdown_tx.subscribe())
                .unwrap();

        // Give the watcher time to establish.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut edited = initial.clone();
        edited.endpoints.insert(
            "/api/test".to_string(),
            EndpointConfig::Error {
                status_code: 404,
                message: Some("t".to_string()),
            },
        );
        fs::write(
            dir.path().join("config.json"),
            serde_json::to_string_pretty(&edited).unwrap(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = store.snapshot().await.unwrap();
            if snapshot.endpoints.contains_key("/api/test") {
                break;
            }
            assert!(Instant::now() < deadline, "reload did not happen within 2s");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_malformed_edit_keeps_previous_config() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(
            dir.path().join("config.json"),
            Arc::new(ObserverHub::new()),
        ));
        let initial = store.load().await.unwrap();

        let (shutdown_tx, _) = broadcast::channel(1);
        let _handle =
            spawn_config_watcher(store.clone(), initial.server.clone(), shutdown_tx.subscribe())
                .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        fs::write(dir.path().join("config.json"), "{broken").unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        // The failed reload leaves the previously adopted snapshot in place.
        let snapshot = store.snapshot().await;
        match snapshot {
            Ok(config) => assert_eq!(config, initial),
            Err(e) => panic!("snapshot unavailable after bad reload: {}", e),
        }
    }

    #[test]
    fn test_watcher_requires_filename() {
        let store = Arc::new(ConfigStore::new("/", Arc::new(ObserverHub::new())));
        let (shutdown_tx, _) = broadcast::channel(1);
        let result = spawn_config_watcher(
            store,
            Config::default_config().server,
            shutdown_tx.subscribe(),
        );
        assert!(result.is_err());
    }
}
