use crate::model::board::Board;
use crate::model::task::{NewTask, Priority};

/// Why a draft cannot be saved or the dialog cannot be closed. The
/// messages are shown to the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("请填写任务标题")]
    MissingTitle,
    #[error("请选择项目")]
    MissingProject,
    #[error("请选择状态")]
    MissingColumn,
    #[error("请先保存或清空任务内容")]
    Unsaved,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// No title and no description: nothing to save, closing is fine.
    Empty,
    /// Complete enough to save.
    Ready,
}

/// A task being created, not yet in any store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTask {
    pub title: String,
    pub description: String,
    /// Empty string means no project chosen.
    pub project_id: String,
    /// Empty string means no column chosen.
    pub column_id: String,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub labels: Vec<String>,
    pub parent_id: Option<String>,
}

/// Pre-filled values for a new draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTaskDefaults {
    pub project_id: Option<String>,
    pub column_id: Option<String>,
    pub labels: Vec<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub parent_id: Option<String>,
}

impl DraftTask {
    fn from_defaults(defaults: NewTaskDefaults, default_column: &str) -> Self {
        DraftTask {
            title: String::new(),
            description: String::new(),
            project_id: defaults.project_id.unwrap_or_default(),
            column_id: defaults
                .column_id
                .unwrap_or_else(|| default_column.to_string()),
            priority: None,
            due_date: defaults.due_date,
            start_date: defaults.start_date,
            labels: defaults.labels,
            parent_id: defaults.parent_id,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.description.trim().is_empty()
    }
}

/// Check a draft. The first missing field wins, in the order title,
/// project, column. A title is only demanded when there is a description.
pub fn validate_draft(draft: &DraftTask) -> Result<Validation, DraftError> {
    let has_title = !draft.title.trim().is_empty();
    let has_description = !draft.description.trim().is_empty();

    if !has_title && !has_description {
        return Ok(Validation::Empty);
    }
    if !has_title {
        return Err(DraftError::MissingTitle);
    }
    if draft.project_id.is_empty() {
        return Err(DraftError::MissingProject);
    }
    if draft.column_id.is_empty() {
        return Err(DraftError::MissingColumn);
    }
    Ok(Validation::Ready)
}

/// Task dialog state: open flag, create/edit mode, the draft and the stack
/// of tasks opened from one another.
#[derive(Debug, Clone)]
pub struct TaskModal {
    is_open: bool,
    create_mode: bool,
    task_stack: Vec<String>,
    draft: DraftTask,
    default_column: String,
}

impl TaskModal {
    pub fn new(default_column: &str) -> Self {
        TaskModal {
            is_open: false,
            create_mode: false,
            task_stack: Vec::new(),
            draft: DraftTask::from_defaults(NewTaskDefaults::default(), default_column),
            default_column: default_column.to_string(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_create_mode(&self) -> bool {
        self.create_mode
    }

    pub fn draft(&self) -> &DraftTask {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut DraftTask {
        &mut self.draft
    }

    pub fn task_stack(&self) -> &[String] {
        &self.task_stack
    }

    /// The task shown in the dialog (top of the stack).
    pub fn current_task_id(&self) -> Option<&str> {
        self.task_stack.last().map(String::as_str)
    }

    /// Open an existing task in edit mode.
    pub fn open_task(&mut self, task_id: &str) {
        self.create_mode = false;
        self.task_stack = vec![task_id.to_string()];
        self.is_open = true;
    }

    /// Open the dialog in create mode with a fresh draft.
    pub fn open_new_task(&mut self, defaults: NewTaskDefaults) {
        self.create_mode = true;
        self.task_stack.clear();
        self.draft = DraftTask::from_defaults(defaults, &self.default_column);
        self.is_open = true;
    }

    /// Drill into a related task (e.g. a subtask) on top of the current one.
    pub fn push_task(&mut self, task_id: &str) {
        self.task_stack.push(task_id.to_string());
    }

    /// Go back one level; popping the last task closes the dialog.
    pub fn pop_task(&mut self) {
        if self.task_stack.len() > 1 {
            self.task_stack.pop();
        } else {
            self.close();
        }
    }

    pub fn validate(&self) -> Result<Validation, DraftError> {
        validate_draft(&self.draft)
    }

    /// Close unless that would silently drop a draft with content.
    pub fn try_close(&mut self) -> Result<(), DraftError> {
        if self.create_mode && self.draft.has_content() {
            validate_draft(&self.draft)?;
            return Err(DraftError::Unsaved);
        }
        self.close();
        Ok(())
    }

    /// Close and discard whatever is in the draft.
    pub fn force_close(&mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.is_open = false;
        self.create_mode = false;
        self.task_stack.clear();
        self.draft = DraftTask::from_defaults(NewTaskDefaults::default(), &self.default_column);
    }

    /// Add the draft to the board and switch to editing the new task.
    ///
    /// Title and description are trimmed; an empty description is stored
    /// as absent. An empty draft saves nothing and returns `Ok(None)`.
    pub fn save_draft(&mut self, board: &mut Board) -> Result<Option<String>, DraftError> {
        if !self.create_mode || validate_draft(&self.draft)? == Validation::Empty {
            return Ok(None);
        }

        let draft = &self.draft;
        let description = draft.description.trim();
        let id = board.add_task(NewTask {
            project_id: draft.project_id.clone(),
            column_id: draft.column_id.clone(),
            title: draft.title.trim().to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            priority: draft.priority,
            due_date: draft.due_date.clone(),
            start_date: draft.start_date.clone(),
            labels: draft.labels.clone(),
            parent_id: draft.parent_id.clone(),
            completed: false,
            location: None,
        });

        self.create_mode = false;
        self.task_stack = vec![id.clone()];
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modal_with(title: &str, description: &str, project: &str, column: &str) -> TaskModal {
        let mut modal = TaskModal::new("todo");
        modal.open_new_task(NewTaskDefaults {
            project_id: Some(project.to_string()).filter(|p| !p.is_empty()),
            ..Default::default()
        });
        let draft = modal.draft_mut();
        draft.title = title.to_string();
        draft.description = description.to_string();
        draft.column_id = column.to_string();
        modal
    }

    #[test]
    fn empty_draft_closes_without_saving() {
        let mut board = Board::new();
        let mut modal = modal_with("", "", "", "todo");
        assert_eq!(modal.try_close(), Ok(()));
        assert!(!modal.is_open());
        assert_eq!(modal.save_draft(&mut board), Ok(None));
        assert!(board.tasks().is_empty());
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        let modal = modal_with("  ", "\n", "", "todo");
        assert_eq!(modal.validate(), Ok(Validation::Empty));
    }

    #[test]
    fn missing_project_reported_before_description() {
        let modal = modal_with("x", "", "", "todo");
        let err = modal.validate().unwrap_err();
        assert_eq!(err, DraftError::MissingProject);
        assert_eq!(err.to_string(), "请选择项目");
    }

    #[test]
    fn first_missing_field_wins() {
        assert_eq!(
            modal_with("", "notes", "", "").validate(),
            Err(DraftError::MissingTitle)
        );
        assert_eq!(
            modal_with("x", "notes", "p", "").validate(),
            Err(DraftError::MissingColumn)
        );
        assert_eq!(modal_with("x", "", "p", "todo").validate(), Ok(Validation::Ready));
    }

    #[test]
    fn try_close_refuses_to_drop_content() {
        let mut modal = modal_with("x", "", "", "todo");
        assert_eq!(modal.try_close(), Err(DraftError::MissingProject));

        modal.draft_mut().project_id = "p".into();
        let err = modal.try_close().unwrap_err();
        assert_eq!(err.to_string(), "请先保存或清空任务内容");
        assert!(modal.is_open());

        modal.force_close();
        assert!(!modal.is_open());
        assert_eq!(modal.draft().title, "");
    }

    #[test]
    fn save_adds_task_and_switches_to_edit_mode() {
        let mut board = Board::new();
        let mut modal = modal_with("  Buy milk ", "  ", "p", "todo");

        let id = modal.save_draft(&mut board).unwrap().unwrap();
        let task = board.tasks().get(&id).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, None);
        assert!(!modal.is_create_mode());
        assert_eq!(modal.current_task_id(), Some(id.as_str()));
        // edit mode closes freely
        assert_eq!(modal.try_close(), Ok(()));
    }

    #[test]
    fn task_stack_push_and_pop() {
        let mut modal = TaskModal::new("todo");
        modal.open_task("1");
        modal.push_task("2");
        assert_eq!(modal.current_task_id(), Some("2"));
        modal.pop_task();
        assert_eq!(modal.current_task_id(), Some("1"));
        modal.pop_task();
        assert!(!modal.is_open());
        assert_eq!(modal.current_task_id(), None);
    }

    #[test]
    fn defaults_prefill_draft() {
        let mut modal = TaskModal::new("backlog");
        modal.open_new_task(NewTaskDefaults {
            parent_id: Some("42".into()),
            ..Default::default()
        });
        assert_eq!(modal.draft().column_id, "backlog");
        assert_eq!(modal.draft().parent_id.as_deref(), Some("42"));
        assert!(modal.is_create_mode());
    }
}
