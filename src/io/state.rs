use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::model::board::Board;
use crate::model::column::{Column, DEFAULT_COMPLETED_COLUMN};
use crate::model::label::Label;
use crate::model::project::Project;
use crate::model::task::Task;
use crate::ops::column_ops::ColumnStore;
use crate::ops::label_ops::LabelStore;
use crate::ops::project_ops::ProjectStore;
use crate::ops::task_ops::TaskStore;

pub const PROJECTS_FILE: &str = "projects.json";
pub const COLUMNS_FILE: &str = "columns.json";
pub const LABELS_FILE: &str = "labels.json";
pub const TASKS_FILE: &str = "tasks.json";
pub const SYNC_FILE: &str = "sync.json";

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("refusing to overwrite {path}, it could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectsFile {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_project_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnsFile {
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    progressing_column_ids: Vec<String>,
    #[serde(default = "default_completed_column")]
    completed_column_id: String,
}

impl Default for ColumnsFile {
    fn default() -> Self {
        ColumnsFile {
            columns: Vec::new(),
            progressing_column_ids: Vec::new(),
            completed_column_id: default_completed_column(),
        }
    }
}

fn default_completed_column() -> String {
    DEFAULT_COMPLETED_COLUMN.to_string()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LabelsFile {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TasksFile {
    #[serde(default)]
    tasks: Vec<Task>,
}

/// Sync settings persisted between runs (sync.json).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Folder holding the shared file; `None` when sync is not configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

/// Where the raw content of a store file that failed to parse is kept.
pub fn backup_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{}.bak", name))
}

/// Read one store file. Missing files are empty stores; unreadable or
/// malformed ones are too, with a warning. Malformed content is copied to
/// the backup file and the recovery log before anything can replace it.
fn read_store<T: DeserializeOwned + Default>(data_dir: &Path, name: &str) -> T {
    let path = data_dir.join(name);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            eprintln!("warning: could not read {}: {}", path.display(), e);
            return T::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        set_aside(data_dir, name, &content, &e.to_string());
        T::default()
    })
}

fn set_aside(data_dir: &Path, name: &str, content: &str, error: &str) {
    let path = data_dir.join(name);
    let backup = backup_path(data_dir, name);
    eprintln!(
        "warning: ignoring malformed {}: {} (copy kept in {})",
        path.display(),
        error,
        backup.display()
    );
    // already kept by an earlier run
    if fs::read_to_string(&backup).is_ok_and(|kept| kept == content) {
        return;
    }
    if let Err(e) = atomic_write(&backup, content.as_bytes()) {
        eprintln!("warning: could not write {}: {}", backup.display(), e);
    }
    log_recovery(
        data_dir,
        RecoveryEntry::new(RecoveryCategory::Quarantine, format!("{} could not be loaded", name))
            .field("File", path.display().to_string())
            .field("Error", error)
            .body(content),
    );
}

fn write_store<T: Serialize>(data_dir: &Path, name: &str, value: &T) -> Result<(), StateError> {
    let path = data_dir.join(name);
    if let Err(source) = fs::File::open(&path)
        && source.kind() != std::io::ErrorKind::NotFound
    {
        return Err(StateError::Unreadable { path, source });
    }
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    atomic_write(&path, content.as_bytes()).map_err(|source| StateError::Write { path, source })
}

/// Load all four stores from the data directory.
pub fn load_board(data_dir: &Path) -> Board {
    let projects: ProjectsFile = read_store(data_dir, PROJECTS_FILE);
    let columns: ColumnsFile = read_store(data_dir, COLUMNS_FILE);
    let labels: LabelsFile = read_store(data_dir, LABELS_FILE);
    let tasks: TasksFile = read_store(data_dir, TASKS_FILE);

    Board::from_stores(
        ProjectStore::from_parts(projects.projects, projects.active_project_id),
        ColumnStore::from_parts(
            columns.columns,
            columns.progressing_column_ids,
            columns.completed_column_id,
        ),
        LabelStore::from_vec(labels.labels),
        TaskStore::from_vec(tasks.tasks),
    )
}

/// Write all four stores.
pub fn save_board(data_dir: &Path, board: &Board) -> Result<(), StateError> {
    write_store(
        data_dir,
        PROJECTS_FILE,
        &ProjectsFile {
            projects: board.projects().to_vec(),
            active_project_id: board.projects().active_project_id().map(str::to_string),
        },
    )?;
    write_store(
        data_dir,
        COLUMNS_FILE,
        &ColumnsFile {
            columns: board.columns().to_vec(),
            progressing_column_ids: board.columns().progressing_column_ids().to_vec(),
            completed_column_id: board.columns().completed_column_id().to_string(),
        },
    )?;
    write_store(
        data_dir,
        LABELS_FILE,
        &LabelsFile {
            labels: board.labels().to_vec(),
        },
    )?;
    write_store(
        data_dir,
        TASKS_FILE,
        &TasksFile {
            tasks: board.tasks().to_vec(),
        },
    )
}

pub fn load_sync_settings(data_dir: &Path) -> SyncSettings {
    read_store(data_dir, SYNC_FILE)
}

pub fn save_sync_settings(data_dir: &Path, settings: &SyncSettings) -> Result<(), StateError> {
    write_store(data_dir, SYNC_FILE, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::task::NewTask;
    use tempfile::TempDir;

    #[test]
    fn empty_dir_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let board = load_board(dir.path());
        assert!(board.tasks().is_empty());
        assert_eq!(board.columns().completed_column_id(), "done");
        assert_eq!(load_sync_settings(dir.path()), SyncSettings::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut board = Board::new();
        board.add_column_with_id("todo", "To Do");
        board.add_column_with_id("doing", "Doing");
        board.toggle_progressing_column("doing");
        let p = board.add_project("Home", None);
        board.set_active_project(Some(&p));
        let l = board.add_label("errand", None);
        board.add_task(NewTask {
            labels: vec![l],
            ..NewTask::new(&p, "todo", "Buy milk")
        });

        save_board(dir.path(), &board).unwrap();
        let loaded = load_board(dir.path());
        assert_eq!(loaded.data(), board.data());
        assert_eq!(loaded.projects().active_project_id(), Some(p.as_str()));
    }

    #[test]
    fn malformed_store_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(TASKS_FILE), "not json {{{").unwrap();
        fs::write(
            dir.path().join(COLUMNS_FILE),
            r#"{"columns":[{"id":"todo","name":"To Do"}]}"#,
        )
        .unwrap();
        let board = load_board(dir.path());
        assert!(board.tasks().is_empty());
        assert_eq!(board.columns().len(), 1);
        assert_eq!(board.columns().completed_column_id(), "done");
    }

    #[test]
    fn malformed_store_is_kept_before_it_can_be_overwritten() {
        let dir = TempDir::new().unwrap();
        let raw = r#"{"tasks":[{"id":"1","title":"keep me","labels":null}]}"#;
        fs::write(dir.path().join(TASKS_FILE), raw).unwrap();

        let board = load_board(dir.path());
        assert!(board.tasks().is_empty());
        save_board(dir.path(), &board).unwrap();

        let kept = fs::read_to_string(backup_path(dir.path(), TASKS_FILE)).unwrap();
        assert_eq!(kept, raw);
        let entries = read_recovery_entries(dir.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Quarantine);
        assert!(entries[0].body.contains("keep me"));

        // loading the same content again does not log it twice
        fs::write(dir.path().join(TASKS_FILE), raw).unwrap();
        load_board(dir.path());
        assert_eq!(read_recovery_entries(dir.path(), None).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_store_is_not_overwritten() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TASKS_FILE);
        fs::write(&path, r#"{"tasks":[]}"#).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&path).is_ok() {
            // running as root, permissions are not enforced
            return;
        }

        let err = save_board(dir.path(), &Board::new()).unwrap_err();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(err, StateError::Unreadable { .. }));
    }

    #[test]
    fn sync_settings_use_camel_case() {
        let dir = TempDir::new().unwrap();
        let settings = SyncSettings {
            sync_path: Some(PathBuf::from("/mnt/drive")),
            last_sync_time: Some("2024-05-10T08:00:00.000Z".into()),
            sync_error: None,
        };
        save_sync_settings(dir.path(), &settings).unwrap();
        let raw = fs::read_to_string(dir.path().join(SYNC_FILE)).unwrap();
        assert!(raw.contains("\"syncPath\""));
        assert!(!raw.contains("syncError"));
        assert_eq!(load_sync_settings(dir.path()), settings);
    }
}
