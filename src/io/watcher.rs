use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches a sync folder for changes to the shared file made by other devices.
pub struct SyncWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

impl SyncWatcher {
    /// Start watching `folder` for creates, writes and renames of `file_name`.
    /// Call `poll` periodically.
    pub fn start(folder: &Path, file_name: &str) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let target = OsString::from(file_name);

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                // atomic writes land as a rename onto the target name
                if event.paths.iter().any(|p| p.file_name() == Some(target.as_os_str())) {
                    let _ = tx.send(());
                }
            },
            Config::default(),
        )?;

        watcher.watch(folder, RecursiveMode::NonRecursive)?;
        Ok(SyncWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// True if the file changed since the last poll. Bursts collapse into one.
    pub fn poll(&self) -> bool {
        self.rx.try_iter().count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn reports_changes_to_the_sync_file_only() {
        let tmp = TempDir::new().unwrap();
        let watcher = SyncWatcher::start(tmp.path(), "task-manager-data.json").unwrap();

        std::fs::write(tmp.path().join("unrelated.txt"), "x").unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(!watcher.poll());

        std::fs::write(tmp.path().join("task-manager-data.json"), "{}").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while !seen && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
            seen = watcher.poll();
        }
        assert!(seen);
    }
}
