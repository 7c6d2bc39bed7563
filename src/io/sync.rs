use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::io::state::SyncSettings;
use crate::io::sync_file::{self, LoadedFile};
use crate::model::board::{Board, BoardData, ChangeEvent, Replacement};
use crate::model::config::DEFAULT_SYNC_FILE;

/// Source of the sync folder (a directory picker in a GUI, an argument in the CLI).
pub trait FolderPicker {
    /// `None` when the user cancelled.
    fn pick_folder(&mut self) -> Option<PathBuf>;
}

/// A picker that always answers with the same path.
impl FolderPicker for Option<PathBuf> {
    fn pick_folder(&mut self) -> Option<PathBuf> {
        self.take()
    }
}

/// File access used by the engine. Writes replace the file wholesale.
pub trait SyncStorage: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// Local filesystem storage; writes go through a temp file and a rename.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl SyncStorage for FsStorage {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        atomic_write(path, content.as_bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No folder configured.
    Unconfigured,
    /// Folder known, change observer not armed yet.
    Initializing,
    /// Watching for changes, no write outstanding.
    Idle,
    /// A write is in flight.
    Syncing,
}

/// Result of asking for a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    Started,
    /// Another write was still in flight.
    Dropped,
    Unconfigured,
}

struct WriteOutcome {
    timestamp: String,
    result: Result<(), String>,
}

/// Single shared file sync, last writer wins.
///
/// At most one write is in flight; a request made while one is outstanding
/// is dropped, not queued. Finished writes are collected by `poll` or
/// `wait_idle`, which record the last sync time or the error string.
pub struct SyncEngine {
    storage: Arc<dyn SyncStorage>,
    file_name: String,
    /// Where recovery entries go; `None` disables them.
    recovery_dir: Option<PathBuf>,
    folder: Option<PathBuf>,
    in_flight: Arc<AtomicBool>,
    outcome_tx: mpsc::Sender<WriteOutcome>,
    outcome_rx: mpsc::Receiver<WriteOutcome>,
    /// Armed change observer; `Some` while watching.
    changes: Option<mpsc::Receiver<ChangeEvent>>,
    /// Changes seen by `poll` that no started write has covered yet.
    pending: bool,
    last_sync_time: Option<String>,
    error: Option<String>,
    /// Timestamp of the file content we last wrote or loaded.
    known_timestamp: Option<String>,
}

impl SyncEngine {
    pub fn new(storage: Arc<dyn SyncStorage>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel();
        SyncEngine {
            storage,
            file_name: DEFAULT_SYNC_FILE.to_string(),
            recovery_dir: None,
            folder: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            outcome_tx,
            outcome_rx,
            changes: None,
            pending: false,
            last_sync_time: None,
            error: None,
            known_timestamp: None,
        }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn with_recovery_dir(mut self, data_dir: &Path) -> Self {
        self.recovery_dir = Some(data_dir.to_path_buf());
        self
    }

    /// Pick up settings persisted by a previous run. The observer is not
    /// armed; call `init_sync` to start watching.
    pub fn restore(&mut self, settings: &SyncSettings) {
        self.folder = settings.sync_path.clone();
        self.last_sync_time = settings.last_sync_time.clone();
        self.error = settings.sync_error.clone();
    }

    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            sync_path: self.folder.clone(),
            last_sync_time: self.last_sync_time.clone(),
            sync_error: self.error.clone(),
        }
    }

    pub fn status(&self) -> SyncStatus {
        if self.folder.is_none() {
            SyncStatus::Unconfigured
        } else if self.in_flight.load(Ordering::SeqCst) {
            SyncStatus::Syncing
        } else if self.changes.is_some() {
            SyncStatus::Idle
        } else {
            SyncStatus::Initializing
        }
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    /// Full path of the shared file, if a folder is configured.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.folder.as_ref().map(|f| f.join(&self.file_name))
    }

    pub fn last_sync_time(&self) -> Option<&str> {
        self.last_sync_time.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.changes.is_some()
    }

    // -----------------------------------------------------------------------
    // Folder lifecycle
    // -----------------------------------------------------------------------

    /// Ask the picker for a folder and initialize from it. Returns false if
    /// the picker was cancelled.
    pub fn select_folder(&mut self, picker: &mut dyn FolderPicker, board: &mut Board) -> bool {
        let Some(folder) = picker.pick_folder() else {
            return false;
        };
        self.folder = Some(folder);
        self.init_sync(board);
        true
    }

    /// Load-replace from the shared file if it can be read, otherwise write
    /// the local board to create it. Then arm the change observer.
    pub fn init_sync(&mut self, board: &mut Board) {
        let Some(path) = self.file_path() else {
            return;
        };
        self.changes = None;
        self.pending = false;

        let loaded = if self.storage.exists(&path) {
            self.read_file(&path)
        } else {
            None
        };
        match loaded {
            Some(loaded) => self.apply_loaded(board, loaded, &path),
            None => {
                self.wait_idle();
                self.sync(board);
                self.wait_idle();
            }
        }
        self.changes = Some(board.subscribe());
    }

    /// Detach the change observer and forget the folder.
    pub fn stop_sync(&mut self) {
        self.changes = None;
        self.pending = false;
        self.folder = None;
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Write a snapshot of the board on a worker thread.
    pub fn sync(&mut self, board: &Board) -> SyncRequest {
        let Some(path) = self.file_path() else {
            return SyncRequest::Unconfigured;
        };
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return SyncRequest::Dropped;
        }
        self.error = None;
        self.pending = false;

        let snapshot = sync_file::capture(board);
        let content = match sync_file::to_json(&snapshot) {
            Ok(c) => c,
            Err(e) => {
                self.in_flight.store(false, Ordering::SeqCst);
                self.record_failure(&path, e.to_string());
                return SyncRequest::Started;
            }
        };
        self.known_timestamp = Some(snapshot.timestamp.clone());

        let storage = Arc::clone(&self.storage);
        let tx = self.outcome_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        thread::spawn(move || {
            let result = storage.write(&path, &content).map_err(|e| e.to_string());
            let _ = tx.send(WriteOutcome {
                timestamp: snapshot.timestamp,
                result,
            });
            in_flight.store(false, Ordering::SeqCst);
        });
        SyncRequest::Started
    }

    /// Collect finished writes and, while watching, turn pending change
    /// events into one sync of the current board. Changes that arrive while
    /// a write is in flight stay pending and are retried on a later poll.
    pub fn poll(&mut self, board: &Board) -> Option<SyncRequest> {
        self.collect_outcomes();
        if let Some(rx) = &self.changes
            && rx.try_iter().count() > 0
        {
            self.pending = true;
        }
        self.pending.then(|| self.sync(board))
    }

    /// Block until no write is in flight, then collect outcomes.
    pub fn wait_idle(&mut self) {
        while self.in_flight.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        self.collect_outcomes();
    }

    fn collect_outcomes(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            match outcome.result {
                Ok(()) => self.last_sync_time = Some(outcome.timestamp),
                Err(e) => {
                    let path = self.file_path().unwrap_or_default();
                    self.record_failure(&path, e);
                }
            }
        }
    }

    fn record_failure(&mut self, path: &Path, error: String) {
        eprintln!("warning: could not write {}: {}", path.display(), error);
        if let Some(dir) = &self.recovery_dir {
            log_recovery(
                dir,
                RecoveryEntry::new(RecoveryCategory::Write, "sync write failed")
                    .field("File", path.display().to_string())
                    .field("Error", error.clone()),
            );
        }
        self.error = Some(format!("Failed to write sync file: {}", error));
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Re-load the shared file after it changed on disk. Files carrying the
    /// timestamp we last wrote or loaded are our own and are skipped.
    pub fn reload_remote(&mut self, board: &mut Board) -> bool {
        let Some(path) = self.file_path() else {
            return false;
        };
        let Some(loaded) = self.read_file(&path) else {
            return false;
        };
        if loaded.timestamp.is_some() && loaded.timestamp == self.known_timestamp {
            return false;
        }
        self.apply_loaded(board, loaded, &path);
        // events from the replace itself must not echo back as a write
        if let Some(rx) = &self.changes {
            rx.try_iter().for_each(drop);
        }
        self.pending = false;
        true
    }

    fn read_file(&mut self, path: &Path) -> Option<LoadedFile> {
        let content = match self.storage.read(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("warning: could not read {}: {}", path.display(), e);
                return None;
            }
        };
        match sync_file::parse_sync_file(&content) {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                eprintln!("warning: {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Replace the board with the file's collections (no merge, no
    /// timestamp comparison).
    fn apply_loaded(&mut self, board: &mut Board, loaded: LoadedFile, path: &Path) {
        let LoadedFile {
            timestamp,
            replacement,
            quarantined,
        } = loaded;

        for q in quarantined {
            eprintln!("warning: {}: skipped key {:?}: {}", path.display(), q.key, q.reason);
            if let Some(dir) = &self.recovery_dir {
                log_recovery(
                    dir,
                    RecoveryEntry::new(RecoveryCategory::Quarantine, format!("key {:?} rejected", q.key))
                        .field("File", path.display().to_string())
                        .field("Reason", q.reason)
                        .body(q.raw),
                );
            }
        }

        let local = board.data();
        let mut incoming = local.clone();
        overlay(&mut incoming, &replacement);
        if !local.is_empty()
            && incoming != local
            && let Some(dir) = &self.recovery_dir
        {
            log_recovery(
                dir,
                RecoveryEntry::new(RecoveryCategory::Conflict, "local board replaced by sync file")
                    .field("File", path.display().to_string())
                    .body(serde_json::to_string_pretty(&local).unwrap_or_default()),
            );
        }

        board.replace(replacement);
        self.known_timestamp = timestamp;
        self.last_sync_time = Some(sync_file::now_timestamp());
    }
}

fn overlay(data: &mut BoardData, replacement: &Replacement) {
    if let Some(tasks) = &replacement.tasks {
        data.tasks = tasks.clone();
    }
    if let Some(projects) = &replacement.projects {
        data.projects = projects.clone();
    }
    if let Some(columns) = &replacement.columns {
        data.columns = columns.clone();
    }
    if let Some(ids) = &replacement.progressing_column_ids {
        data.progressing_column_ids = ids.clone();
    }
    if let Some(id) = &replacement.completed_column_id {
        data.completed_column_id = id.clone();
    }
    if let Some(labels) = &replacement.labels {
        data.labels = labels.clone();
    }
}
