use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches individual files and calls `on_change` with the changed path.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by rename keep triggering events.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new<F>(paths: Vec<PathBuf>, on_change: F) -> Result<Self>
    where
        F: Fn(&Path) + Send + 'static,
    {
        let (tx, rx) = channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        let mut targets = Vec::new();
        for path in paths {
            let Some(name) = path.file_name().map(|n| n.to_os_string()) else {
                warn!("Not a file path, skipping: {}", path.display());
                continue;
            };
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !dir.exists() {
                warn!("Directory does not exist, skipping: {}", dir.display());
                continue;
            }
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            info!("Watching schema file: {}", path.display());
            targets.push((name, path));
        }

        std::thread::spawn(move || loop {
            let event: Event = match rx.recv() {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    error!("Watch error: {:?}", e);
                    continue;
                }
                Err(_) => break,
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                continue;
            }
            let Some((_, path)) = targets.iter().find(|(name, _)| {
                event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(name.as_os_str()))
            }) else {
                continue;
            };

            // Swallow the burst of events a single save produces
            loop {
                match rx.recv_timeout(DEBOUNCE) {
                    Ok(_) => continue,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            info!("Change detected in {}, reloading...", path.display());
            on_change(path);
        });

        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_reports_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.json");
        std::fs::write(&schema, "{}").unwrap();

        let (tx, rx) = mpsc::channel();
        let _watcher = ConfigWatcher::new(vec![schema.clone()], move |path| {
            let _ = tx.send(path.to_path_buf());
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(200));
        std::fs::write(&schema, "{\"type\": \"object\"}").unwrap();

        let changed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(changed, schema);
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let watcher = ConfigWatcher::new(vec![PathBuf::from("/nonexistent/dir/schema.json")], |_| {});
        assert!(watcher.is_ok());
    }
}
