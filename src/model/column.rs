use serde::{Deserialize, Serialize};

/// Id of the column that is the completed column until configured otherwise.
pub const DEFAULT_COMPLETED_COLUMN: &str = "done";

/// A kanban column (a task state such as "todo" or "done").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPatch {
    pub name: Option<String>,
    pub order: Option<i64>,
}

impl Column {
    pub fn apply(&mut self, patch: ColumnPatch) -> bool {
        let before = self.clone();
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        *self != before
    }
}
