use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::ids::IdGenerator;
use crate::model::task::{NewTask, Task, TaskPatch};
use crate::ops::is_permutation;

/// An ordering scope. Top-level tasks are ordered per project and column,
/// subtasks per parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    TopLevel {
        project_id: String,
        column_id: String,
    },
    Subtasks {
        parent_id: String,
    },
}

impl Scope {
    pub fn of(task: &Task) -> Scope {
        match &task.parent_id {
            Some(parent_id) => Scope::Subtasks {
                parent_id: parent_id.clone(),
            },
            None => Scope::TopLevel {
                project_id: task.project_id.clone(),
                column_id: task.column_id.clone(),
            },
        }
    }

    pub fn contains(&self, task: &Task) -> bool {
        match self {
            Scope::TopLevel {
                project_id,
                column_id,
            } => {
                task.parent_id.is_none()
                    && task.project_id == *project_id
                    && task.column_id == *column_id
            }
            Scope::Subtasks { parent_id } => task.parent_id.as_deref() == Some(parent_id),
        }
    }
}

/// All task records, top-level and subtasks, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: IndexMap<String, Task>,
}

impl TaskStore {
    pub fn from_vec(tasks: Vec<Task>) -> Self {
        TaskStore {
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Members of a scope, sorted by order. Ties keep insertion order.
    pub fn members(&self, scope: &Scope) -> Vec<&Task> {
        sorted(self.tasks.values().filter(|t| scope.contains(t)))
    }

    /// Top-level tasks of a project.
    pub fn by_project(&self, project_id: &str) -> Vec<&Task> {
        sorted(
            self.tasks
                .values()
                .filter(|t| t.is_top_level() && t.project_id == project_id),
        )
    }

    /// Top-level tasks in a column, optionally narrowed to one project.
    pub fn by_column(&self, column_id: &str, project_id: Option<&str>) -> Vec<&Task> {
        sorted(self.tasks.values().filter(|t| {
            t.is_top_level()
                && t.column_id == column_id
                && project_id.is_none_or(|p| t.project_id == p)
        }))
    }

    /// Top-level tasks in any of the given columns.
    pub fn by_columns(&self, column_ids: &[String]) -> Vec<&Task> {
        sorted(
            self.tasks
                .values()
                .filter(|t| t.is_top_level() && column_ids.contains(&t.column_id)),
        )
    }

    /// Direct children of a task.
    pub fn subtasks(&self, parent_id: &str) -> Vec<&Task> {
        sorted(
            self.tasks
                .values()
                .filter(|t| t.parent_id.as_deref() == Some(parent_id)),
        )
    }

    /// All transitive children, depth-first, parents before their children.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id.to_string()]);
        self.collect_descendants(id, &mut seen, &mut out);
        out
    }

    fn collect_descendants(&self, id: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for child in self.subtasks(id) {
            if seen.insert(child.id.clone()) {
                out.push(child.id.clone());
                self.collect_descendants(&child.id, seen, out);
            }
        }
    }

    /// Parent chain from the immediate parent up to the root.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut current = self.tasks.get(id).and_then(|t| t.parent_id.clone());
        while let Some(parent) = current {
            if parent == id || out.contains(&parent) {
                break;
            }
            current = self.tasks.get(&parent).and_then(|t| t.parent_id.clone());
            out.push(parent);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert a new task at the end of its scope and return its id.
    pub fn add(&mut self, ids: &mut IdGenerator, new_task: NewTask) -> String {
        let id = ids.next("", |candidate| self.tasks.contains_key(candidate));
        let task = new_task.into_task(id.clone(), 0);
        let order = self.next_order(&Scope::of(&task));
        self.tasks.insert(id.clone(), Task { order, ..task });
        id
    }

    /// Shallow-merge the side-effect-free fields of a patch.
    pub fn apply_plain(&mut self, id: &str, patch: &TaskPatch) -> bool {
        match self.tasks.get_mut(id) {
            Some(task) => patch.apply_plain(task),
            None => false,
        }
    }

    /// Remove a single record. Children are not touched; see `hierarchy::delete_task`.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Task> {
        self.tasks.shift_remove(id)
    }

    fn next_order(&self, scope: &Scope) -> i64 {
        self.tasks
            .values()
            .filter(|t| scope.contains(t))
            .map(|t| t.order)
            .max()
            .unwrap_or(-1)
            + 1
    }

    /// Set `order = index` for each listed id.
    pub(crate) fn renumber(&mut self, ordered_ids: &[String]) {
        for (i, id) in ordered_ids.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(id) {
                task.order = i as i64;
            }
        }
    }

    /// Renumber a scope to `0..n-1`, keeping its current relative order.
    pub(crate) fn compact(&mut self, scope: &Scope) {
        let ids: Vec<String> = self.members(scope).iter().map(|t| t.id.clone()).collect();
        self.renumber(&ids);
    }

    /// Reorder the top-level tasks of one project column. The id list must
    /// be a full permutation of the scope, otherwise nothing changes.
    pub fn reorder(&mut self, project_id: &str, column_id: &str, ordered_ids: &[String]) -> bool {
        let scope = Scope::TopLevel {
            project_id: project_id.to_string(),
            column_id: column_id.to_string(),
        };
        self.reorder_scope(&scope, ordered_ids)
    }

    /// Reorder the direct children of a task.
    pub fn reorder_subtasks(&mut self, parent_id: &str, ordered_ids: &[String]) -> bool {
        let scope = Scope::Subtasks {
            parent_id: parent_id.to_string(),
        };
        self.reorder_scope(&scope, ordered_ids)
    }

    fn reorder_scope(&mut self, scope: &Scope, ordered_ids: &[String]) -> bool {
        let members = self.members(scope);
        if !is_permutation(ordered_ids, members.iter().map(|t| t.id.as_str())) {
            return false;
        }
        self.renumber(ordered_ids);
        true
    }

    /// Drop a label id from every task that carries it.
    pub fn strip_label(&mut self, label_id: &str) -> bool {
        let mut changed = false;
        for task in self.tasks.values_mut() {
            let before = task.labels.len();
            task.labels.retain(|l| l != label_id);
            changed |= task.labels.len() != before;
        }
        changed
    }
}

/// Sort by `order` ascending; the sort is stable so ties keep position.
fn sorted<'a>(tasks: impl Iterator<Item = &'a Task>) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks.collect();
    out.sort_by_key(|t| t.order);
    out
}
