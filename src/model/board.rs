use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::model::column::{Column, ColumnPatch, DEFAULT_COMPLETED_COLUMN};
use crate::model::ids::IdGenerator;
use crate::model::label::{Label, LabelPatch};
use crate::model::project::{Project, ProjectPatch};
use crate::model::task::{NewTask, Task, TaskPatch};
use crate::ops::column_ops::ColumnStore;
use crate::ops::hierarchy::{self, TaskError};
use crate::ops::label_ops::LabelStore;
use crate::ops::project_ops::ProjectStore;
use crate::ops::task_ops::TaskStore;

/// Which entity store a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Projects,
    Columns,
    Labels,
    Tasks,
}

/// Emitted after every mutation that changed something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub store: StoreKind,
}

/// Fan-out of change events to any number of subscribers. Subscribers whose
/// receiver has been dropped are forgotten on the next emit.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: Vec<mpsc::Sender<ChangeEvent>>,
}

impl ChangeNotifier {
    pub fn subscribe(&mut self) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, store: StoreKind) {
        self.subscribers
            .retain(|tx| tx.send(ChangeEvent { store }).is_ok());
    }
}

/// Every collection of the board, in the shape shared with other devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardData {
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub columns: Vec<Column>,
    pub progressing_column_ids: Vec<String>,
    pub completed_column_id: String,
    pub labels: Vec<Label>,
}

impl Default for BoardData {
    fn default() -> Self {
        BoardData {
            tasks: Vec::new(),
            projects: Vec::new(),
            columns: Vec::new(),
            progressing_column_ids: Vec::new(),
            completed_column_id: DEFAULT_COMPLETED_COLUMN.to_string(),
            labels: Vec::new(),
        }
    }
}

impl BoardData {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.projects.is_empty()
            && self.columns.is_empty()
            && self.labels.is_empty()
    }
}

/// A set of collections to swap in wholesale. `None` keeps the current one.
#[derive(Debug, Clone, Default)]
pub struct Replacement {
    pub tasks: Option<Vec<Task>>,
    pub projects: Option<Vec<Project>>,
    pub columns: Option<Vec<Column>>,
    pub progressing_column_ids: Option<Vec<String>>,
    pub completed_column_id: Option<String>,
    pub labels: Option<Vec<Label>>,
}

impl From<BoardData> for Replacement {
    fn from(data: BoardData) -> Self {
        Replacement {
            tasks: Some(data.tasks),
            projects: Some(data.projects),
            columns: Some(data.columns),
            progressing_column_ids: Some(data.progressing_column_ids),
            completed_column_id: Some(data.completed_column_id),
            labels: Some(data.labels),
        }
    }
}

/// The four entity stores plus the id generator and change notifier.
///
/// All mutations go through `Board` so that engine side effects are applied
/// and a `ChangeEvent` is emitted for each store that changed. Methods
/// return `false` (or an empty result) for unknown ids.
#[derive(Debug, Default)]
pub struct Board {
    projects: ProjectStore,
    columns: ColumnStore,
    labels: LabelStore,
    tasks: TaskStore,
    ids: IdGenerator,
    notifier: ChangeNotifier,
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    pub fn from_stores(
        projects: ProjectStore,
        columns: ColumnStore,
        labels: LabelStore,
        tasks: TaskStore,
    ) -> Self {
        Board {
            projects,
            columns,
            labels,
            tasks,
            ids: IdGenerator::new(),
            notifier: ChangeNotifier::default(),
        }
    }

    pub fn projects(&self) -> &ProjectStore {
        &self.projects
    }

    pub fn columns(&self) -> &ColumnStore {
        &self.columns
    }

    pub fn labels(&self) -> &LabelStore {
        &self.labels
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    fn notify(&mut self, store: StoreKind, changed: bool) -> bool {
        if changed {
            self.notifier.emit(store);
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub fn add_project(&mut self, name: &str, color: Option<&str>) -> String {
        let id = self.projects.add(&mut self.ids, name, color);
        self.notify(StoreKind::Projects, true);
        id
    }

    pub fn update_project(&mut self, id: &str, patch: ProjectPatch) -> bool {
        let changed = self.projects.update(id, patch);
        self.notify(StoreKind::Projects, changed)
    }

    pub fn delete_project(&mut self, id: &str) -> bool {
        let changed = self.projects.delete(id);
        self.notify(StoreKind::Projects, changed)
    }

    pub fn reorder_projects(&mut self, ordered_ids: &[String]) -> bool {
        let changed = self.projects.reorder(ordered_ids);
        self.notify(StoreKind::Projects, changed)
    }

    pub fn set_active_project(&mut self, id: Option<&str>) -> bool {
        let changed = self.projects.set_active(id);
        self.notify(StoreKind::Projects, changed)
    }

    // -----------------------------------------------------------------------
    // Columns
    // -----------------------------------------------------------------------

    pub fn add_column(&mut self, name: &str) -> String {
        let id = self.columns.add(&mut self.ids, name);
        self.notify(StoreKind::Columns, true);
        id
    }

    pub fn add_column_with_id(&mut self, id: &str, name: &str) -> bool {
        let changed = self.columns.add_with_id(id, name);
        self.notify(StoreKind::Columns, changed)
    }

    pub fn update_column(&mut self, id: &str, patch: ColumnPatch) -> bool {
        let changed = self.columns.update(id, patch);
        self.notify(StoreKind::Columns, changed)
    }

    pub fn delete_column(&mut self, id: &str) -> bool {
        let changed = self.columns.delete(id);
        self.notify(StoreKind::Columns, changed)
    }

    pub fn reorder_columns(&mut self, ordered_ids: &[String]) -> bool {
        let changed = self.columns.reorder(ordered_ids);
        self.notify(StoreKind::Columns, changed)
    }

    pub fn set_progressing_columns(&mut self, ids: &[String]) -> bool {
        let changed = self.columns.set_progressing(ids);
        self.notify(StoreKind::Columns, changed)
    }

    pub fn toggle_progressing_column(&mut self, id: &str) -> bool {
        let changed = self.columns.toggle_progressing(id);
        self.notify(StoreKind::Columns, changed)
    }

    pub fn set_completed_column(&mut self, id: &str) -> bool {
        let changed = self.columns.set_completed_column(id);
        self.notify(StoreKind::Columns, changed)
    }

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    pub fn add_label(&mut self, name: &str, color: Option<&str>) -> String {
        let id = self.labels.add(&mut self.ids, name, color);
        self.notify(StoreKind::Labels, true);
        id
    }

    pub fn update_label(&mut self, id: &str, patch: LabelPatch) -> bool {
        let changed = self.labels.update(id, patch);
        self.notify(StoreKind::Labels, changed)
    }

    /// Remove a label and drop its id from every task.
    pub fn delete_label(&mut self, id: &str) -> bool {
        if !self.labels.delete(id) {
            return false;
        }
        self.notify(StoreKind::Labels, true);
        let stripped = self.tasks.strip_label(id);
        self.notify(StoreKind::Tasks, stripped);
        true
    }

    pub fn reorder_labels(&mut self, ordered_ids: &[String]) -> bool {
        let changed = self.labels.reorder(ordered_ids);
        self.notify(StoreKind::Labels, changed)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Insert a task at the end of its scope.
    ///
    /// A top-level task created in the completed column, or a subtask of a
    /// completed parent, starts out completed; a task created completed is
    /// placed like `set_completed` would place it.
    pub fn add_task(&mut self, new_task: NewTask) -> String {
        let in_done = new_task.parent_id.is_none()
            && new_task.column_id == self.columns.completed_column_id();
        let parent_done = new_task
            .parent_id
            .as_deref()
            .and_then(|p| self.tasks.get(p))
            .is_some_and(|p| p.completed);
        let completed = new_task.completed || in_done || parent_done;

        let id = self.tasks.add(
            &mut self.ids,
            NewTask {
                completed: false,
                ..new_task
            },
        );
        if completed {
            hierarchy::set_completed(&mut self.tasks, &self.columns, &id, true);
        }
        self.notify(StoreKind::Tasks, true);
        id
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> bool {
        let changed = hierarchy::update_task(&mut self.tasks, &self.columns, id, patch);
        self.notify(StoreKind::Tasks, changed)
    }

    pub fn set_completed(&mut self, id: &str, value: bool) -> bool {
        let changed = hierarchy::set_completed(&mut self.tasks, &self.columns, id, value);
        self.notify(StoreKind::Tasks, changed)
    }

    pub fn move_task(&mut self, id: &str, column_id: &str, index: Option<usize>) -> bool {
        let changed = hierarchy::move_task(&mut self.tasks, &self.columns, id, column_id, index);
        self.notify(StoreKind::Tasks, changed)
    }

    /// Delete a task and its subtree, returning the removed records.
    pub fn delete_task(&mut self, id: &str) -> Vec<Task> {
        let removed = hierarchy::delete_task(&mut self.tasks, id);
        self.notify(StoreKind::Tasks, !removed.is_empty());
        removed
    }

    pub fn reorder_tasks(&mut self, project_id: &str, column_id: &str, ordered_ids: &[String]) -> bool {
        let changed = self.tasks.reorder(project_id, column_id, ordered_ids);
        self.notify(StoreKind::Tasks, changed)
    }

    pub fn reorder_subtasks(&mut self, parent_id: &str, ordered_ids: &[String]) -> bool {
        let changed = self.tasks.reorder_subtasks(parent_id, ordered_ids);
        self.notify(StoreKind::Tasks, changed)
    }

    pub fn trash_task(&mut self, id: &str) -> bool {
        self.set_trashed(id, true)
    }

    pub fn restore_task(&mut self, id: &str) -> bool {
        self.set_trashed(id, false)
    }

    fn set_trashed(&mut self, id: &str, trashed: bool) -> bool {
        let patch = TaskPatch {
            is_trashed: Some(trashed),
            ..Default::default()
        };
        let changed = self.tasks.apply_plain(id, &patch);
        self.notify(StoreKind::Tasks, changed)
    }

    pub fn reparent_task(&mut self, id: &str, new_parent: Option<&str>) -> Result<bool, TaskError> {
        let changed = hierarchy::reparent_task(&mut self.tasks, id, new_parent)?;
        Ok(self.notify(StoreKind::Tasks, changed))
    }

    // -----------------------------------------------------------------------
    // Whole-board snapshot / replace
    // -----------------------------------------------------------------------

    pub fn data(&self) -> BoardData {
        BoardData {
            tasks: self.tasks.to_vec(),
            projects: self.projects.to_vec(),
            columns: self.columns.to_vec(),
            progressing_column_ids: self.columns.progressing_column_ids().to_vec(),
            completed_column_id: self.columns.completed_column_id().to_string(),
            labels: self.labels.to_vec(),
        }
    }

    /// Overwrite collections wholesale (load-replace, no merge). Emits one
    /// event per replaced store. The completed column is dropped from the
    /// progressing set afterwards.
    pub fn replace(&mut self, replacement: Replacement) {
        let Replacement {
            tasks,
            projects,
            columns,
            progressing_column_ids,
            completed_column_id,
            labels,
        } = replacement;

        if let Some(tasks) = tasks {
            self.tasks = TaskStore::from_vec(tasks);
            self.notify(StoreKind::Tasks, true);
        }
        if let Some(projects) = projects {
            let active = self.projects.active_project_id().map(str::to_string);
            self.projects = ProjectStore::from_parts(projects, active);
            self.notify(StoreKind::Projects, true);
        }
        if columns.is_some() || progressing_column_ids.is_some() || completed_column_id.is_some() {
            let columns = columns.unwrap_or_else(|| self.columns.to_vec());
            let progressing =
                progressing_column_ids.unwrap_or_else(|| self.columns.progressing_column_ids().to_vec());
            let completed =
                completed_column_id.unwrap_or_else(|| self.columns.completed_column_id().to_string());
            self.columns = ColumnStore::from_parts(columns, progressing, completed);
            self.notify(StoreKind::Columns, true);
        }
        if let Some(labels) = labels {
            self.labels = LabelStore::from_vec(labels);
            self.notify(StoreKind::Labels, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Board {
        let mut board = Board::new();
        board.add_column_with_id("todo", "To Do");
        board.add_column_with_id("doing", "In Progress");
        board.add_column_with_id("done", "Done");
        board
    }

    fn drain(rx: &mpsc::Receiver<ChangeEvent>) -> Vec<StoreKind> {
        rx.try_iter().map(|e| e.store).collect()
    }

    #[test]
    fn mutations_emit_change_events() {
        let mut board = seeded();
        let rx = board.subscribe();

        let p = board.add_project("Home", None);
        let t = board.add_task(NewTask::new(&p, "todo", "Water plants"));
        assert!(board.set_completed(&t, true));
        assert_eq!(
            drain(&rx),
            vec![StoreKind::Projects, StoreKind::Tasks, StoreKind::Tasks]
        );

        // no-ops stay silent
        assert!(!board.update_task("missing", TaskPatch::default()));
        assert!(!board.reorder_columns(&["todo".into()]));
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut board = seeded();
        let rx = board.subscribe();
        drop(rx);
        board.add_label("urgent", None);
        assert!(board.notifier.subscribers.is_empty());
    }

    #[test]
    fn add_task_in_completed_column_is_completed() {
        let mut board = seeded();
        let t = board.add_task(NewTask::new("p", "done", "Already done"));
        assert!(board.tasks().get(&t).unwrap().completed);

        let sub = board.add_task(NewTask {
            parent_id: Some(t.clone()),
            ..NewTask::new("p", "todo", "child")
        });
        assert!(board.tasks().get(&sub).unwrap().completed);
    }

    #[test]
    fn delete_label_strips_from_tasks() {
        let mut board = seeded();
        let label = board.add_label("errand", None);
        let t = board.add_task(NewTask {
            labels: vec![label.clone()],
            ..NewTask::new("p", "todo", "Buy milk")
        });
        assert!(board.delete_label(&label));
        assert!(board.tasks().get(&t).unwrap().labels.is_empty());
        assert!(!board.delete_label(&label));
    }

    #[test]
    fn trash_and_restore() {
        let mut board = seeded();
        let t = board.add_task(NewTask::new("p", "todo", "x"));
        assert!(board.trash_task(&t));
        assert!(board.tasks().get(&t).unwrap().trashed());
        assert!(!board.trash_task(&t));
        assert!(board.restore_task(&t));
        assert!(!board.tasks().get(&t).unwrap().trashed());
    }

    #[test]
    fn replace_overwrites_and_enforces_designations() {
        let mut board = seeded();
        board.add_task(NewTask::new("p", "todo", "local"));
        let rx = board.subscribe();

        board.replace(Replacement {
            tasks: Some(Vec::new()),
            progressing_column_ids: Some(vec!["doing".into(), "done".into()]),
            ..Default::default()
        });
        assert!(board.tasks().is_empty());
        assert_eq!(board.columns().progressing_column_ids(), ["doing".to_string()]);
        assert_eq!(board.columns().len(), 3);
        assert_eq!(drain(&rx), vec![StoreKind::Tasks, StoreKind::Columns]);
    }

    #[test]
    fn data_round_trips_through_replace() {
        let mut board = seeded();
        let p = board.add_project("Work", None);
        board.toggle_progressing_column("doing");
        let parent = board.add_task(NewTask::new(&p, "todo", "parent"));
        board.add_task(NewTask {
            parent_id: Some(parent),
            ..NewTask::new(&p, "todo", "child")
        });
        let data = board.data();

        let mut fresh = Board::new();
        fresh.replace(data.clone().into());
        assert_eq!(fresh.data(), data);
    }
}
