use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::model::board::{Board, BoardData, Replacement};
use crate::model::column::Column;
use crate::model::label::Label;
use crate::model::project::Project;
use crate::model::task::Task;

/// A full board snapshot stamped with the time it was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub timestamp: String,
    #[serde(flatten)]
    pub data: BoardData,
}

/// Current time as ISO-8601 with milliseconds and a `Z` suffix.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn capture(board: &Board) -> SyncSnapshot {
    SyncSnapshot {
        timestamp: now_timestamp(),
        data: board.data(),
    }
}

/// Pretty-printed sync file content.
pub fn to_json(snapshot: &SyncSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

#[derive(Debug, thiserror::Error)]
pub enum SyncFileError {
    #[error("sync file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sync file is not a JSON object")]
    NotObject,
}

/// A top-level key that was present but rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quarantined {
    pub key: String,
    pub reason: String,
    /// The rejected value, pretty-printed.
    pub raw: String,
}

/// The accepted part of a sync file.
#[derive(Debug, Clone, Default)]
pub struct LoadedFile {
    pub timestamp: Option<String>,
    pub replacement: Replacement,
    pub quarantined: Vec<Quarantined>,
}

/// Parse sync file content key by key.
///
/// Every known key is validated on its own: a missing or `null` key is left
/// alone, a key whose value does not fit its schema (or a collection with
/// repeated ids) is quarantined, and the remaining keys still load. Unknown
/// keys are ignored.
pub fn parse_sync_file(content: &str) -> Result<LoadedFile, SyncFileError> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Object(obj) = value else {
        return Err(SyncFileError::NotObject);
    };

    let mut quarantined = Vec::new();
    let mut q = |key: &str, reason: String, raw: &Value| {
        quarantined.push(Quarantined {
            key: key.to_string(),
            reason,
            raw: serde_json::to_string_pretty(raw).unwrap_or_default(),
        });
    };

    let tasks: Option<Vec<Task>> = load_key(&obj, "tasks", &mut q)
        .and_then(|v| unique_ids(&obj, "tasks", v, |t: &Task| &t.id, &mut q));
    let projects: Option<Vec<Project>> = load_key(&obj, "projects", &mut q)
        .and_then(|v| unique_ids(&obj, "projects", v, |p: &Project| &p.id, &mut q));
    let columns: Option<Vec<Column>> = load_key(&obj, "columns", &mut q)
        .and_then(|v| unique_ids(&obj, "columns", v, |c: &Column| &c.id, &mut q));
    let labels: Option<Vec<Label>> = load_key(&obj, "labels", &mut q)
        .and_then(|v| unique_ids(&obj, "labels", v, |l: &Label| &l.id, &mut q));
    let progressing_column_ids: Option<Vec<String>> = load_key(&obj, "progressingColumnIds", &mut q);
    let completed_column_id: Option<String> = load_key(&obj, "completedColumnId", &mut q)
        .and_then(|id: String| {
            if id.is_empty() {
                q("completedColumnId", "empty column id".into(), &Value::String(id));
                None
            } else {
                Some(id)
            }
        });
    let timestamp = obj.get("timestamp").and_then(Value::as_str).map(str::to_string);

    Ok(LoadedFile {
        timestamp,
        replacement: Replacement {
            tasks,
            projects,
            columns,
            progressing_column_ids,
            completed_column_id,
            labels,
        },
        quarantined,
    })
}

fn load_key<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    key: &str,
    q: &mut impl FnMut(&str, String, &Value),
) -> Option<T> {
    let value = obj.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            q(key, e.to_string(), value);
            None
        }
    }
}

fn unique_ids<T>(
    obj: &Map<String, Value>,
    key: &str,
    items: Vec<T>,
    id_of: impl Fn(&T) -> &String,
    q: &mut impl FnMut(&str, String, &Value),
) -> Option<Vec<T>> {
    let mut seen = HashSet::new();
    let duplicate = items
        .iter()
        .map(&id_of)
        .find(|id| !seen.insert(id.as_str()))
        .cloned();
    match duplicate {
        None => Some(items),
        Some(dup) => {
            let reason = format!("duplicate id {:?}", dup);
            q(key, reason, &obj[key]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::NewTask;

    fn sample_board() -> Board {
        let mut board = Board::new();
        board.add_column_with_id("todo", "To Do");
        board.add_column_with_id("done", "Done");
        let p = board.add_project("Home", None);
        board.add_task(NewTask::new(&p, "todo", "Buy milk"));
        board
    }

    #[test]
    fn written_shape_has_fixed_keys() {
        let json = to_json(&capture(&sample_board())).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "timestamp",
            "tasks",
            "projects",
            "columns",
            "progressingColumnIds",
            "completedColumnId",
            "labels",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert!(json.contains("\n  \"tasks\""));
        // 2024-05-10T08:00:00.123Z
        let ts = value["timestamp"].as_str().unwrap();
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn parse_round_trips_a_snapshot() {
        let board = sample_board();
        let snapshot = capture(&board);
        let loaded = parse_sync_file(&to_json(&snapshot).unwrap()).unwrap();
        assert!(loaded.quarantined.is_empty());
        assert_eq!(loaded.timestamp.as_deref(), Some(snapshot.timestamp.as_str()));

        let mut fresh = Board::new();
        fresh.replace(loaded.replacement);
        assert_eq!(fresh.data(), board.data());
    }

    #[test]
    fn absent_keys_are_left_alone() {
        let loaded = parse_sync_file(r#"{"labels":[{"id":"label-1","name":"x","color":"red"}]}"#).unwrap();
        assert!(loaded.replacement.tasks.is_none());
        assert!(loaded.replacement.completed_column_id.is_none());
        assert_eq!(loaded.replacement.labels.unwrap().len(), 1);
        assert!(loaded.timestamp.is_none());
    }

    #[test]
    fn bad_key_is_quarantined_others_load() {
        let loaded = parse_sync_file(
            r#"{
                "tasks": [{"id": 5, "title": "no project"}],
                "projects": [{"id":"proj-1","name":"Home","color":"blue"}],
                "completedColumnId": "",
                "settings": {"theme": "dark"}
            }"#,
        )
        .unwrap();
        let keys: Vec<&str> = loaded.quarantined.iter().map(|q| q.key.as_str()).collect();
        assert_eq!(keys, vec!["tasks", "completedColumnId"]);
        assert!(loaded.replacement.tasks.is_none());
        assert_eq!(loaded.replacement.projects.unwrap()[0].name, "Home");
        assert!(loaded.quarantined[0].raw.contains("no project"));
    }

    #[test]
    fn duplicate_ids_are_quarantined() {
        let loaded = parse_sync_file(
            r#"{"columns":[{"id":"todo","name":"A","order":0},{"id":"todo","name":"B","order":1}]}"#,
        )
        .unwrap();
        assert!(loaded.replacement.columns.is_none());
        assert_eq!(loaded.quarantined[0].reason, "duplicate id \"todo\"");
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(matches!(parse_sync_file("[1,2,3]"), Err(SyncFileError::NotObject)));
        assert!(matches!(parse_sync_file("{oops"), Err(SyncFileError::Json(_))));
    }
}
