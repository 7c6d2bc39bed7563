use serde::{Deserialize, Serialize};

/// Colours handed out to new labels, cycled by creation index.
pub const LABEL_PALETTE: [&str; 9] = [
    "red", "orange", "yellow", "green", "blue", "indigo", "purple", "pink", "gray",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl Label {
    pub fn apply(&mut self, patch: LabelPatch) -> bool {
        let before = self.clone();
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        *self != before
    }
}
