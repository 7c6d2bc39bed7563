use std::collections::HashSet;

use crate::model::task::{Task, TaskPatch};
use crate::ops::column_ops::ColumnStore;
use crate::ops::task_ops::{Scope, TaskStore};

/// Error type for hierarchy changes that must be refused rather than ignored.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("cannot move {task} under {parent}: {parent} is {task} or one of its subtasks")]
    Cycle { task: String, parent: String },
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Set a task's completion flag.
///
/// Completing a top-level task moves it into the completed column (when that
/// column still exists); un-completing a top-level task that sits in the
/// completed column moves it to the first open column. The flag is then
/// pushed down to every descendant regardless of their own column.
pub fn set_completed(tasks: &mut TaskStore, columns: &ColumnStore, task_id: &str, value: bool) -> bool {
    let Some(task) = tasks.get(task_id) else {
        return false;
    };
    let top_level = task.is_top_level();
    let column_id = task.column_id.clone();

    let mut changed = false;
    if let Some(task) = tasks.get_mut(task_id)
        && task.completed != value
    {
        task.completed = value;
        changed = true;
    }

    if top_level {
        let done = columns.completed_column_id();
        if value && column_id != done && columns.contains(done) {
            let done = done.to_string();
            relocate(tasks, task_id, |t| t.column_id = done, None);
            changed = true;
        } else if !value
            && column_id == done
            && let Some(open) = columns.first_open_column()
        {
            let open = open.id.clone();
            relocate(tasks, task_id, |t| t.column_id = open, None);
            changed = true;
        }
    }

    changed | cascade_completion(tasks, task_id, value)
}

/// Apply `completed = value` to every descendant of `task_id`.
fn cascade_completion(tasks: &mut TaskStore, task_id: &str, value: bool) -> bool {
    let mut changed = false;
    for id in tasks.descendants(task_id) {
        if let Some(child) = tasks.get_mut(&id)
            && child.completed != value
        {
            child.completed = value;
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Move a task to another column, optionally to a position in that column.
///
/// Entering the completed column completes the task and its descendants.
/// Leaving it clears the task's own flag only: descendants keep whatever
/// state they had. `new_index` only applies to top-level tasks.
pub fn move_task(
    tasks: &mut TaskStore,
    columns: &ColumnStore,
    task_id: &str,
    new_column_id: &str,
    new_index: Option<usize>,
) -> bool {
    let Some(before) = tasks.get(task_id).cloned() else {
        return false;
    };
    let index = if before.is_top_level() { new_index } else { None };
    let target = new_column_id.to_string();
    relocate(tasks, task_id, |t| t.column_id = target, index);

    let done = columns.completed_column_id();
    let mut cascaded = false;
    if before.column_id != new_column_id {
        if new_column_id == done {
            if let Some(task) = tasks.get_mut(task_id) {
                task.completed = true;
            }
            cascaded = cascade_completion(tasks, task_id, true);
        } else if before.column_id == done
            && let Some(task) = tasks.get_mut(task_id)
        {
            task.completed = false;
        }
    }

    cascaded || tasks.get(task_id) != Some(&before)
}

/// Apply `change` to a task and place it in the scope it ends up in.
///
/// If the scope changes, the old scope is renumbered to close the gap and
/// the task goes to the end of the new one (or to `index`). With an index
/// and an unchanged scope the task is spliced into position. The target
/// scope is renumbered `0..n-1` whenever the task is placed.
fn relocate(tasks: &mut TaskStore, task_id: &str, change: impl FnOnce(&mut Task), index: Option<usize>) {
    let Some(old_scope) = tasks.get(task_id).map(Scope::of) else {
        return;
    };
    let Some(task) = tasks.get_mut(task_id) else {
        return;
    };
    change(task);
    let new_scope = Scope::of(task);

    let moved = new_scope != old_scope;
    if moved {
        tasks.compact(&old_scope);
    } else if index.is_none() {
        return;
    }

    let mut ids: Vec<String> = tasks
        .members(&new_scope)
        .iter()
        .filter(|t| t.id != task_id)
        .map(|t| t.id.clone())
        .collect();
    let at = index.unwrap_or(ids.len()).min(ids.len());
    ids.insert(at, task_id.to_string());
    tasks.renumber(&ids);
}

// ---------------------------------------------------------------------------
// Update / delete / reparent
// ---------------------------------------------------------------------------

/// Merge a partial update, routing project, column and completion changes
/// through the engine so the invariants hold afterwards.
pub fn update_task(tasks: &mut TaskStore, columns: &ColumnStore, task_id: &str, patch: TaskPatch) -> bool {
    let Some(current) = tasks.get(task_id).cloned() else {
        return false;
    };
    let mut changed = tasks.apply_plain(task_id, &patch);

    if let Some(project_id) = patch.project_id
        && project_id != current.project_id
    {
        relocate(tasks, task_id, |t| t.project_id = project_id, None);
        changed = true;
    }
    if let Some(column_id) = patch.column_id
        && column_id != current.column_id
    {
        changed |= move_task(tasks, columns, task_id, &column_id, None);
    }
    if let Some(completed) = patch.completed {
        changed |= set_completed(tasks, columns, task_id, completed);
    }
    changed
}

/// Delete a task and, depth-first, all of its descendants. The removed
/// records are returned, children before their parents.
pub fn delete_task(tasks: &mut TaskStore, task_id: &str) -> Vec<Task> {
    let Some(scope) = tasks.get(task_id).map(Scope::of) else {
        return Vec::new();
    };
    let mut removed = Vec::new();
    let mut visited = HashSet::new();
    delete_recursive(tasks, task_id, &mut visited, &mut removed);
    tasks.compact(&scope);
    removed
}

fn delete_recursive(tasks: &mut TaskStore, task_id: &str, visited: &mut HashSet<String>, removed: &mut Vec<Task>) {
    if !visited.insert(task_id.to_string()) {
        return;
    }
    let children: Vec<String> = tasks.subtasks(task_id).iter().map(|t| t.id.clone()).collect();
    for child in children {
        delete_recursive(tasks, &child, visited, removed);
    }
    if let Some(task) = tasks.remove(task_id) {
        removed.push(task);
    }
}

/// Move a task under a new parent (or to the top level with `None`).
///
/// The new parent's ancestor chain is walked first; a task can never become
/// its own ancestor. A reparented task takes the new parent's project.
pub fn reparent_task(tasks: &mut TaskStore, task_id: &str, new_parent: Option<&str>) -> Result<bool, TaskError> {
    let Some(task) = tasks.get(task_id) else {
        return Ok(false);
    };
    if task.parent_id.as_deref() == new_parent {
        return Ok(false);
    }

    let parent_project = match new_parent {
        Some(parent_id) => {
            let parent = tasks
                .get(parent_id)
                .ok_or_else(|| TaskError::NotFound(parent_id.to_string()))?;
            let in_own_subtree = parent_id == task_id
                || tasks.ancestors(parent_id).iter().any(|a| a == task_id);
            if in_own_subtree {
                return Err(TaskError::Cycle {
                    task: task_id.to_string(),
                    parent: parent_id.to_string(),
                });
            }
            Some(parent.project_id.clone())
        }
        None => None,
    };

    let parent_id = new_parent.map(str::to_string);
    relocate(
        tasks,
        task_id,
        |t| {
            t.parent_id = parent_id;
            if let Some(project_id) = parent_project {
                t.project_id = project_id;
            }
        },
        None,
    );
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::IdGenerator;
    use crate::model::task::NewTask;

    struct Fixture {
        tasks: TaskStore,
        columns: ColumnStore,
        ids: IdGenerator,
    }

    impl Fixture {
        fn new() -> Self {
            let mut columns = ColumnStore::default();
            columns.add_with_id("todo", "To Do");
            columns.add_with_id("doing", "Doing");
            columns.add_with_id("done", "Done");
            Fixture {
                tasks: TaskStore::default(),
                columns,
                ids: IdGenerator::new(),
            }
        }

        fn add(&mut self, column: &str, title: &str) -> String {
            self.tasks.add(&mut self.ids, NewTask::new("p", column, title))
        }

        fn add_sub(&mut self, parent: &str, title: &str) -> String {
            let new_task = NewTask {
                parent_id: Some(parent.to_string()),
                ..NewTask::new("p", "todo", title)
            };
            self.tasks.add(&mut self.ids, new_task)
        }

        fn task(&self, id: &str) -> &Task {
            self.tasks.get(id).unwrap()
        }

        fn column_orders(&self, column: &str) -> Vec<(String, i64)> {
            self.tasks
                .by_column(column, Some("p"))
                .iter()
                .map(|t| (t.title.clone(), t.order))
                .collect()
        }
    }

    /// parent -> child -> grandchild.
    fn family(fx: &mut Fixture) -> (String, String, String) {
        let parent = fx.add("todo", "parent");
        let child = fx.add_sub(&parent, "child");
        let grandchild = fx.add_sub(&child, "grandchild");
        (parent, child, grandchild)
    }

    #[test]
    fn completing_moves_to_completed_column_and_back() {
        let mut fx = Fixture::new();
        let id = fx.add("todo", "write");

        assert!(set_completed(&mut fx.tasks, &fx.columns, &id, true));
        assert_eq!(fx.task(&id).column_id, "done");
        assert!(fx.task(&id).completed);

        assert!(move_task(&mut fx.tasks, &fx.columns, &id, "todo", None));
        assert_eq!(fx.task(&id).column_id, "todo");
        assert!(!fx.task(&id).completed);
    }

    #[test]
    fn completion_cascades_to_all_descendants() {
        let mut fx = Fixture::new();
        let (parent, child, grandchild) = family(&mut fx);

        set_completed(&mut fx.tasks, &fx.columns, &parent, true);
        assert!(fx.task(&child).completed);
        assert!(fx.task(&grandchild).completed);

        set_completed(&mut fx.tasks, &fx.columns, &parent, false);
        assert!(!fx.task(&child).completed);
        assert!(!fx.task(&grandchild).completed);
    }

    #[test]
    fn completing_a_leaf_never_touches_ancestors() {
        let mut fx = Fixture::new();
        let (parent, child, grandchild) = family(&mut fx);

        set_completed(&mut fx.tasks, &fx.columns, &grandchild, true);
        assert!(fx.task(&grandchild).completed);
        assert!(!fx.task(&child).completed);
        assert!(!fx.task(&parent).completed);
        // subtasks are not relocated
        assert_eq!(fx.task(&grandchild).column_id, "todo");
    }

    #[test]
    fn completing_without_completed_column_only_sets_flag() {
        let mut fx = Fixture::new();
        let id = fx.add("todo", "write");
        fx.columns.delete("done");

        assert!(set_completed(&mut fx.tasks, &fx.columns, &id, true));
        assert!(fx.task(&id).completed);
        assert_eq!(fx.task(&id).column_id, "todo");
    }

    #[test]
    fn uncompleting_in_completed_column_moves_to_first_open_column() {
        let mut fx = Fixture::new();
        let id = fx.add("todo", "write");
        set_completed(&mut fx.tasks, &fx.columns, &id, true);

        set_completed(&mut fx.tasks, &fx.columns, &id, false);
        assert!(!fx.task(&id).completed);
        assert_eq!(fx.task(&id).column_id, "todo");
    }

    #[test]
    fn move_into_completed_column_cascades() {
        let mut fx = Fixture::new();
        let (parent, child, grandchild) = family(&mut fx);

        move_task(&mut fx.tasks, &fx.columns, &parent, "done", None);
        assert!(fx.task(&parent).completed);
        assert!(fx.task(&child).completed);
        assert!(fx.task(&grandchild).completed);
    }

    #[test]
    fn move_out_of_completed_column_does_not_reverse_cascade() {
        // Completing cascades down; un-completing by moving out does not.
        let mut fx = Fixture::new();
        let (parent, child, grandchild) = family(&mut fx);
        move_task(&mut fx.tasks, &fx.columns, &parent, "done", None);

        move_task(&mut fx.tasks, &fx.columns, &parent, "doing", None);
        assert!(!fx.task(&parent).completed);
        assert!(fx.task(&child).completed);
        assert!(fx.task(&grandchild).completed);
    }

    #[test]
    fn move_with_index_splices_and_renumbers() {
        let mut fx = Fixture::new();
        fx.add("doing", "a");
        fx.add("doing", "b");
        let c = fx.add("todo", "c");
        let d = fx.add("todo", "d");

        assert!(move_task(&mut fx.tasks, &fx.columns, &c, "doing", Some(1)));
        assert_eq!(
            fx.column_orders("doing"),
            vec![("a".into(), 0), ("c".into(), 1), ("b".into(), 2)]
        );
        // the column it left is closed up
        assert_eq!(fx.column_orders("todo"), vec![("d".into(), 0)]);

        // index past the end clamps
        assert!(move_task(&mut fx.tasks, &fx.columns, &d, "doing", Some(99)));
        assert_eq!(fx.task(&d).order, 3);
    }

    #[test]
    fn move_within_column_reorders() {
        let mut fx = Fixture::new();
        fx.add("todo", "a");
        fx.add("todo", "b");
        let c = fx.add("todo", "c");

        assert!(move_task(&mut fx.tasks, &fx.columns, &c, "todo", Some(0)));
        assert_eq!(
            fx.column_orders("todo"),
            vec![("c".into(), 0), ("a".into(), 1), ("b".into(), 2)]
        );
        assert!(!move_task(&mut fx.tasks, &fx.columns, &c, "todo", Some(0)));
    }

    #[test]
    fn move_missing_task_is_noop() {
        let mut fx = Fixture::new();
        assert!(!move_task(&mut fx.tasks, &fx.columns, "nope", "done", None));
    }

    #[test]
    fn delete_removes_whole_subtree() {
        let mut fx = Fixture::new();
        let (parent, child, grandchild) = family(&mut fx);
        let sibling = fx.add_sub(&parent, "sibling");
        let keep = fx.add("todo", "keep");

        let removed = delete_task(&mut fx.tasks, &parent);
        let removed_ids: Vec<&str> = removed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(removed_ids, vec![grandchild.as_str(), child.as_str(), sibling.as_str(), parent.as_str()]);

        assert_eq!(fx.tasks.len(), 1);
        assert!(fx.tasks.iter().all(|t| t.parent_id.as_deref() != Some(parent.as_str())));
        assert_eq!(fx.task(&keep).order, 0);
    }

    #[test]
    fn delete_survives_parent_cycle_in_loaded_data() {
        let tasks: Vec<Task> = serde_json::from_str(
            r#"[
                {"id":"a","projectId":"p","columnId":"todo","title":"a","parentId":"b"},
                {"id":"b","projectId":"p","columnId":"todo","title":"b","parentId":"a"}
            ]"#,
        )
        .unwrap();
        let mut store = TaskStore::from_vec(tasks);
        let removed = delete_task(&mut store, "a");
        assert_eq!(removed.len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn update_routes_engine_fields() {
        let mut fx = Fixture::new();
        let id = fx.add("todo", "write");

        let patch = TaskPatch {
            title: Some("rewrite".into()),
            completed: Some(true),
            ..Default::default()
        };
        assert!(update_task(&mut fx.tasks, &fx.columns, &id, patch));
        assert_eq!(fx.task(&id).title, "rewrite");
        assert_eq!(fx.task(&id).column_id, "done");

        let patch = TaskPatch {
            column_id: Some("doing".into()),
            ..Default::default()
        };
        assert!(update_task(&mut fx.tasks, &fx.columns, &id, patch));
        assert!(!fx.task(&id).completed);

        assert!(!update_task(&mut fx.tasks, &fx.columns, "nope", TaskPatch::default()));
    }

    #[test]
    fn update_project_relocates_to_end_of_new_scope() {
        let mut fx = Fixture::new();
        let a = fx.add("todo", "a");
        fx.add("todo", "b");
        fx.tasks.add(&mut fx.ids, NewTask::new("q", "todo", "q1"));

        let patch = TaskPatch {
            project_id: Some("q".into()),
            ..Default::default()
        };
        assert!(update_task(&mut fx.tasks, &fx.columns, &a, patch));
        assert_eq!(fx.task(&a).order, 1);
        assert_eq!(fx.column_orders("todo"), vec![("b".into(), 0)]);
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut fx = Fixture::new();
        let (parent, child, grandchild) = family(&mut fx);

        let err = reparent_task(&mut fx.tasks, &parent, Some(&grandchild)).unwrap_err();
        assert!(matches!(err, TaskError::Cycle { .. }));
        assert!(reparent_task(&mut fx.tasks, &parent, Some(&parent)).is_err());
        assert!(fx.task(&parent).is_top_level());

        assert!(reparent_task(&mut fx.tasks, &grandchild, None).unwrap());
        assert!(fx.task(&grandchild).is_top_level());
        assert_eq!(fx.tasks.descendants(&child), Vec::<String>::new());
        assert!(!reparent_task(&mut fx.tasks, "nope", None).unwrap());
        assert!(matches!(
            reparent_task(&mut fx.tasks, &grandchild, Some("nope")),
            Err(TaskError::NotFound(_))
        ));
    }
}
