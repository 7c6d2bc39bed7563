use serde::{Deserialize, Serialize};

/// Colours handed out to new projects, cycled by creation index.
pub const PROJECT_PALETTE: [&str; 9] = [
    "blue", "red", "green", "orange", "purple", "pink", "yellow", "cyan", "indigo",
];

/// A project groups tasks; it has no ordering field, its position in the
/// store is its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Partial update for a project. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    /// `Some(None)` clears the icon.
    pub icon: Option<Option<String>>,
}

impl Project {
    /// Shallow-merge a patch into this project. Returns true if anything changed.
    pub fn apply(&mut self, patch: ProjectPatch) -> bool {
        let before = self.clone();
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        *self != before
    }
}
