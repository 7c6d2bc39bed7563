use serde::{Deserialize, Serialize};

/// Task priority, serialized lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Negligible,
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Negligible => "negligible",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "negligible" => Some(Priority::Negligible),
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A task record. Subtasks are flat records pointing at their parent
/// through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub column_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// `YYYY-MM-DD`, optionally followed by `T` and a time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Label ids.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// Position within the task's ordering scope.
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_trashed: Option<bool>,
}

impl Task {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn trashed(&self) -> bool {
        self.is_trashed.unwrap_or(false)
    }
}

/// Fields supplied when creating a task. Id and order are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: String,
    pub column_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub labels: Vec<String>,
    pub parent_id: Option<String>,
    pub completed: bool,
    pub location: Option<String>,
}

impl NewTask {
    pub fn new(project_id: &str, column_id: &str, title: &str) -> Self {
        NewTask {
            project_id: project_id.to_string(),
            column_id: column_id.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn into_task(self, id: String, order: i64) -> Task {
        Task {
            id,
            project_id: self.project_id,
            column_id: self.column_id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            due_date: self.due_date,
            start_date: self.start_date,
            labels: self.labels,
            parent_id: self.parent_id,
            completed: self.completed,
            order,
            location: self.location,
            is_trashed: Some(false),
        }
    }
}

/// Partial update for a task. Outer `None` leaves a field untouched; for
/// optional fields `Some(None)` clears it.
///
/// There is no `parent_id` or `order` here: reparenting goes through
/// `hierarchy::reparent_task` (cycle checked) and ordering through the
/// store's reorder operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub project_id: Option<String>,
    pub column_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Option<Priority>>,
    pub due_date: Option<Option<String>>,
    pub start_date: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
    pub completed: Option<bool>,
    pub location: Option<Option<String>>,
    pub is_trashed: Option<bool>,
}

impl TaskPatch {
    /// Merge the fields that carry no engine side effects (everything but
    /// project, column and completion flag). Returns true if anything changed.
    pub(crate) fn apply_plain(&self, task: &mut Task) -> bool {
        let before = task.clone();
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = &self.due_date {
            task.due_date = due.clone();
        }
        if let Some(start) = &self.start_date {
            task.start_date = start.clone();
        }
        if let Some(labels) = &self.labels {
            task.labels = labels.clone();
        }
        if let Some(location) = &self.location {
            task.location = location.clone();
        }
        if let Some(trashed) = self.is_trashed {
            task.is_trashed = Some(trashed);
        }
        *task != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_record_with_defaults() {
        let task: Task = serde_json::from_str(
            r#"{"id":"1","projectId":"p","columnId":"todo","title":"Write"}"#,
        )
        .unwrap();
        assert_eq!(task.order, 0);
        assert!(task.labels.is_empty());
        assert!(!task.completed);
        assert!(task.is_top_level());
        assert!(!task.trashed());
    }

    #[test]
    fn serializes_camel_case_and_skips_absent_fields() {
        let task = NewTask::new("p", "todo", "Write").into_task("7".into(), 2);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["projectId"], "p");
        assert_eq!(json["columnId"], "todo");
        assert_eq!(json["isTrashed"], false);
        assert!(json.get("parentId").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn priority_accepts_full_set() {
        let p: Priority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(p, Priority::Urgent);
        assert_eq!(Priority::parse("medium"), Some(Priority::Medium));
        assert_eq!(Priority::parse("whenever"), None);
    }

    #[test]
    fn patch_clears_optional_field() {
        let mut task = NewTask::new("p", "todo", "Write").into_task("1".into(), 0);
        task.description = Some("notes".into());
        let patch = TaskPatch {
            description: Some(None),
            ..Default::default()
        };
        assert!(patch.apply_plain(&mut task));
        assert_eq!(task.description, None);
        assert!(!patch.apply_plain(&mut task));
    }
}
