use std::collections::HashSet;

use serde::Serialize;

use crate::io::sync::{SyncEngine, SyncStatus};
use crate::model::column::Column;
use crate::model::label::Label;
use crate::model::project::Project;
use crate::model::task::{Priority, Task};
use crate::ops::column_ops::ColumnStore;
use crate::ops::label_ops::LabelStore;
use crate::ops::task_ops::TaskStore;
use crate::ops::views::{MatchField, SearchHit};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson<'a>>,
}

#[derive(Serialize)]
pub struct ColumnListingJson<'a> {
    pub column: String,
    pub name: String,
    pub tasks: Vec<TaskJson<'a>>,
}

#[derive(Serialize)]
pub struct ColumnInfoJson {
    pub id: String,
    pub name: String,
    pub order: i64,
    pub progressing: bool,
    pub completed: bool,
    pub tasks: usize,
}

#[derive(Serialize)]
pub struct ProjectInfoJson {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub active: bool,
    pub tasks: usize,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub task_id: String,
    pub title: String,
    pub field: String,
}

#[derive(Serialize)]
pub struct SyncStatusJson {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// A task with its subtree. Records already seen are not repeated, so a
/// corrupt parent chain cannot recurse forever.
pub fn task_to_json<'a>(tasks: &'a TaskStore, task: &'a Task) -> TaskJson<'a> {
    let mut seen = HashSet::new();
    task_json_inner(tasks, task, &mut seen)
}

fn task_json_inner<'a>(tasks: &'a TaskStore, task: &'a Task, seen: &mut HashSet<&'a str>) -> TaskJson<'a> {
    seen.insert(&task.id);
    let mut subtasks = Vec::new();
    for sub in tasks.subtasks(&task.id) {
        if !seen.contains(sub.id.as_str()) {
            subtasks.push(task_json_inner(tasks, sub, seen));
        }
    }
    TaskJson { task, subtasks }
}

pub fn column_to_json(column: &Column, columns: &ColumnStore, tasks: usize) -> ColumnInfoJson {
    ColumnInfoJson {
        id: column.id.clone(),
        name: column.name.clone(),
        order: column.order,
        progressing: columns.is_progressing(&column.id),
        completed: columns.completed_column_id() == column.id,
        tasks,
    }
}

pub fn project_to_json(project: &Project, active: bool, tasks: usize) -> ProjectInfoJson {
    ProjectInfoJson {
        id: project.id.clone(),
        name: project.name.clone(),
        color: project.color.clone(),
        icon: project.icon.clone(),
        active,
        tasks,
    }
}

pub fn search_hit_to_json(hit: &SearchHit, tasks: &TaskStore) -> SearchHitJson {
    SearchHitJson {
        task_id: hit.task_id.clone(),
        title: tasks
            .get(&hit.task_id)
            .map(|t| t.title.clone())
            .unwrap_or_default(),
        field: field_name(hit.field).to_string(),
    }
}

pub fn sync_status_to_json(engine: &SyncEngine) -> SyncStatusJson {
    SyncStatusJson {
        status: status_name(engine.status()),
        file: engine.file_path().map(|p| p.display().to_string()),
        last_sync_time: engine.last_sync_time().map(str::to_string),
        error: engine.error().map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn checkbox(task: &Task) -> &'static str {
    if task.trashed() {
        "[-]"
    } else if task.completed {
        "[x]"
    } else {
        "[ ]"
    }
}

pub fn field_name(field: MatchField) -> &'static str {
    match field {
        MatchField::Title => "title",
        MatchField::Description => "description",
    }
}

pub fn status_name(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Unconfigured => "unconfigured",
        SyncStatus::Initializing => "initializing",
        SyncStatus::Idle => "idle",
        SyncStatus::Syncing => "syncing",
    }
}

fn label_names(task: &Task, labels: &LabelStore) -> String {
    task.labels
        .iter()
        .map(|id| {
            let name = labels.get(id).map_or(id.as_str(), |l| l.name.as_str());
            format!(" #{}", name)
        })
        .collect()
}

/// One-line summary: `[ ] <id> <title> !<priority> start:<date> due:<date> #<label>`.
pub fn format_task_line(task: &Task, labels: &LabelStore) -> String {
    let mut line = format!("{} {} {}", checkbox(task), task.id, task.title);
    if let Some(priority) = task.priority {
        line.push_str(&format!(" !{}", priority.as_str()));
    }
    if let Some(start) = &task.start_date {
        line.push_str(&format!(" start:{}", start));
    }
    if let Some(due) = &task.due_date {
        line.push_str(&format!(" due:{}", due));
    }
    line.push_str(&label_names(task, labels));
    line
}

/// A task with its subtasks, indented two spaces per level.
pub fn format_task_tree(tasks: &TaskStore, labels: &LabelStore, task: &Task, indent: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut seen = HashSet::new();
    push_tree(tasks, labels, task, indent, &mut seen, &mut lines);
    lines
}

fn push_tree<'a>(
    tasks: &'a TaskStore,
    labels: &LabelStore,
    task: &'a Task,
    indent: usize,
    seen: &mut HashSet<&'a str>,
    lines: &mut Vec<String>,
) {
    if !seen.insert(&task.id) {
        return;
    }
    lines.push(format!("{}{}", "  ".repeat(indent), format_task_line(task, labels)));
    for sub in tasks.subtasks(&task.id) {
        push_tree(tasks, labels, sub, indent + 1, seen, lines);
    }
}

/// Detailed view of one task.
pub fn format_task_detail(
    task: &Task,
    tasks: &TaskStore,
    columns: &ColumnStore,
    labels: &LabelStore,
    project: Option<&Project>,
) -> Vec<String> {
    let mut lines = vec![format!("{} {} {}", checkbox(task), task.id, task.title)];

    let project_name = project.map_or(task.project_id.as_str(), |p| p.name.as_str());
    lines.push(format!("project: {}", project_name));
    let column_name = columns
        .get(&task.column_id)
        .map_or(task.column_id.as_str(), |c| c.name.as_str());
    lines.push(format!("column: {}", column_name));
    if let Some(parent) = &task.parent_id {
        lines.push(format!("parent: {}", parent));
    }
    if let Some(priority) = task.priority {
        lines.push(format!("priority: {}", priority.as_str()));
    }
    if let Some(start) = &task.start_date {
        lines.push(format!("start: {}", start));
    }
    if let Some(due) = &task.due_date {
        lines.push(format!("due: {}", due));
    }
    if !task.labels.is_empty() {
        lines.push(format!("labels:{}", label_names(task, labels)));
    }
    if let Some(location) = &task.location {
        lines.push(format!("location: {}", location));
    }
    if let Some(description) = &task.description {
        lines.push("description:".to_string());
        for line in description.lines() {
            lines.push(format!("  {}", line));
        }
    }

    let subtasks = tasks.subtasks(&task.id);
    if !subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in subtasks {
            lines.extend(format_task_tree(tasks, labels, sub, 1));
        }
    }
    lines
}

fn designation(column: &Column, columns: &ColumnStore) -> &'static str {
    if columns.completed_column_id() == column.id {
        " [completed]"
    } else if columns.is_progressing(&column.id) {
        " [progressing]"
    } else {
        ""
    }
}

/// `== To Do (todo) ==`, marked when the column is progressing or completed.
pub fn format_column_header(column: &Column, columns: &ColumnStore) -> String {
    format!("== {} ({}) =={}", column.name, column.id, designation(column, columns))
}

/// Board listing for one column: header then the task trees.
pub fn format_column_listing(
    column: &Column,
    columns: &ColumnStore,
    labels: &LabelStore,
    tasks: &TaskStore,
    top_level: &[&Task],
) -> Vec<String> {
    let mut lines = vec![format_column_header(column, columns)];
    for task in top_level {
        lines.extend(format_task_tree(tasks, labels, task, 0));
    }
    lines
}

/// Row for `tb column list`.
pub fn format_column_info(column: &Column, columns: &ColumnStore, task_count: usize) -> String {
    format!(
        "  {} ({}) {} tasks{}",
        column.name,
        column.id,
        task_count,
        designation(column, columns)
    )
}

/// Row for `tb project list`; the active project is starred.
pub fn format_project_info(project: &Project, active: bool, task_count: usize) -> String {
    let marker = if active { "*" } else { " " };
    let icon = project
        .icon
        .as_deref()
        .map(|i| format!(" {}", i))
        .unwrap_or_default();
    format!(
        "{} {} ({}) [{}]{} {} tasks",
        marker, project.name, project.id, project.color, icon, task_count
    )
}

pub fn format_label_info(label: &Label, task_count: usize) -> String {
    format!("  #{} ({}) [{}] {} tasks", label.name, label.id, label.color, task_count)
}

pub fn format_sync_status(engine: &SyncEngine) -> Vec<String> {
    let mut lines = vec![format!("status: {}", status_name(engine.status()))];
    if let Some(path) = engine.file_path() {
        lines.push(format!("file: {}", path.display()));
    }
    lines.push(format!(
        "last sync: {}",
        engine.last_sync_time().unwrap_or("never")
    ));
    if let Some(error) = engine.error() {
        lines.push(format!("error: {}", error));
    }
    lines
}

/// Parse a priority name.
pub fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::parse(s).ok_or_else(|| {
        format!(
            "unknown priority '{}' (expected: negligible, low, medium, high, urgent)",
            s
        )
    })
}
