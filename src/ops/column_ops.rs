use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::column::{Column, ColumnPatch, DEFAULT_COMPLETED_COLUMN};
use crate::model::ids::IdGenerator;
use crate::ops::is_permutation;

/// Columns plus the two column designations.
///
/// The completed column is never a member of the progressing set; every
/// operation that touches either designation keeps it that way.
#[derive(Debug, Clone)]
pub struct ColumnStore {
    columns: IndexMap<String, Column>,
    progressing_column_ids: Vec<String>,
    completed_column_id: String,
}

impl Default for ColumnStore {
    fn default() -> Self {
        ColumnStore {
            columns: IndexMap::new(),
            progressing_column_ids: Vec::new(),
            completed_column_id: DEFAULT_COMPLETED_COLUMN.to_string(),
        }
    }
}

impl ColumnStore {
    pub fn from_parts(
        columns: Vec<Column>,
        progressing_column_ids: Vec<String>,
        completed_column_id: String,
    ) -> Self {
        let mut store = ColumnStore {
            columns: columns.into_iter().map(|c| (c.id.clone(), c)).collect(),
            progressing_column_ids: Vec::new(),
            completed_column_id,
        };
        store.set_progressing(&progressing_column_ids);
        store
    }

    /// Columns in storage order.
    pub fn to_vec(&self) -> Vec<Column> {
        self.columns.values().cloned().collect()
    }

    /// Columns sorted by `order` (ties keep storage order).
    pub fn ordered(&self) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self.columns.values().collect();
        cols.sort_by_key(|c| c.order);
        cols
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Column> {
        self.columns.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.columns.contains_key(id)
    }

    /// Look a column up by id, falling back to an exact name match.
    pub fn resolve(&self, id_or_name: &str) -> Option<&Column> {
        self.columns
            .get(id_or_name)
            .or_else(|| self.columns.values().find(|c| c.name == id_or_name))
    }

    pub fn completed_column_id(&self) -> &str {
        &self.completed_column_id
    }

    pub fn progressing_column_ids(&self) -> &[String] {
        &self.progressing_column_ids
    }

    pub fn is_progressing(&self, id: &str) -> bool {
        self.progressing_column_ids.iter().any(|p| p == id)
    }

    /// Lowest-order column that is not the completed column.
    pub fn first_open_column(&self) -> Option<&Column> {
        self.ordered()
            .into_iter()
            .find(|c| c.id != self.completed_column_id)
    }

    fn next_order(&self) -> i64 {
        self.columns.values().map(|c| c.order).max().unwrap_or(-1) + 1
    }

    pub fn add(&mut self, ids: &mut IdGenerator, name: &str) -> String {
        let id = ids.next("col-", |candidate| self.columns.contains_key(candidate));
        self.insert(id.clone(), name);
        id
    }

    /// Create a column with a caller-chosen id (used for the seeded columns).
    /// Returns false if the id is taken.
    pub fn add_with_id(&mut self, id: &str, name: &str) -> bool {
        if self.columns.contains_key(id) {
            return false;
        }
        self.insert(id.to_string(), name);
        true
    }

    fn insert(&mut self, id: String, name: &str) {
        let order = self.next_order();
        self.columns.insert(
            id.clone(),
            Column {
                id,
                name: name.to_string(),
                order,
            },
        );
    }

    pub fn update(&mut self, id: &str, patch: ColumnPatch) -> bool {
        match self.columns.get_mut(id) {
            Some(column) => column.apply(patch),
            None => false,
        }
    }

    /// Remove a column and drop it from the progressing set.
    ///
    /// Deleting the completed column leaves the designation pointing at a
    /// missing column; completing a task then only sets the flag.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.columns.shift_remove(id).is_none() {
            return false;
        }
        self.progressing_column_ids.retain(|p| p != id);
        true
    }

    /// Assign `order = index` for a full permutation of the columns.
    pub fn reorder(&mut self, ordered_ids: &[String]) -> bool {
        if !is_permutation(ordered_ids, self.columns.keys().map(String::as_str)) {
            return false;
        }
        let rank: HashMap<&str, i64> = ordered_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i as i64))
            .collect();
        for (id, column) in self.columns.iter_mut() {
            if let Some(&order) = rank.get(id.as_str()) {
                column.order = order;
            }
        }
        self.columns.sort_by(|_, a, _, b| a.order.cmp(&b.order));
        true
    }

    /// Replace the progressing set. The completed column and duplicates are dropped.
    pub fn set_progressing(&mut self, ids: &[String]) -> bool {
        let mut next: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if *id != self.completed_column_id && !next.contains(id) {
                next.push(id.clone());
            }
        }
        if next == self.progressing_column_ids {
            return false;
        }
        self.progressing_column_ids = next;
        true
    }

    /// Flip a column's membership in the progressing set. The completed
    /// column can never be added.
    pub fn toggle_progressing(&mut self, id: &str) -> bool {
        if id == self.completed_column_id {
            return false;
        }
        if let Some(pos) = self.progressing_column_ids.iter().position(|p| p == id) {
            self.progressing_column_ids.remove(pos);
        } else {
            self.progressing_column_ids.push(id.to_string());
        }
        true
    }

    /// Designate the completed column, removing it from the progressing set.
    pub fn set_completed_column(&mut self, id: &str) -> bool {
        if self.completed_column_id == id {
            return false;
        }
        self.completed_column_id = id.to_string();
        self.progressing_column_ids.retain(|p| p != id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ColumnStore {
        let mut store = ColumnStore::default();
        store.add_with_id("todo", "To Do");
        store.add_with_id("doing", "In Progress");
        store.add_with_id("done", "Done");
        store
    }

    #[test]
    fn add_assigns_next_order() {
        let mut ids = IdGenerator::new();
        let mut store = store();
        let id = store.add(&mut ids, "Review");
        assert!(id.starts_with("col-"));
        assert_eq!(store.get(&id).unwrap().order, 3);
        assert!(!store.add_with_id("todo", "Again"));
    }

    #[test]
    fn completed_column_leaves_progressing_set() {
        let mut store = store();
        assert!(store.toggle_progressing("doing"));
        assert!(store.is_progressing("doing"));

        assert!(store.set_completed_column("doing"));
        assert_eq!(store.completed_column_id(), "doing");
        assert!(!store.is_progressing("doing"));
    }

    #[test]
    fn completed_column_cannot_be_progressing() {
        let mut store = store();
        assert!(!store.toggle_progressing("done"));
        store.set_progressing(&["done".into(), "doing".into(), "doing".into()]);
        assert_eq!(store.progressing_column_ids(), ["doing".to_string()]);
    }

    #[test]
    fn delete_drops_from_progressing() {
        let mut store = store();
        store.toggle_progressing("doing");
        assert!(store.delete("doing"));
        assert!(store.progressing_column_ids().is_empty());
        assert!(!store.delete("doing"));
    }

    #[test]
    fn reorder_sets_order_from_index() {
        let mut store = store();
        assert!(store.reorder(&["done".into(), "todo".into(), "doing".into()]));
        let ids: Vec<&str> = store.ordered().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["done", "todo", "doing"]);
        assert_eq!(store.get("doing").unwrap().order, 2);

        assert!(!store.reorder(&["done".into(), "todo".into()]));
        assert_eq!(store.get("doing").unwrap().order, 2);
    }

    #[test]
    fn first_open_column_skips_completed() {
        let mut store = store();
        store.reorder(&["done".into(), "doing".into(), "todo".into()]);
        assert_eq!(store.first_open_column().unwrap().id, "doing");
    }

    #[test]
    fn from_parts_enforces_designations() {
        let store = ColumnStore::from_parts(
            vec![],
            vec!["done".into(), "doing".into()],
            "done".into(),
        );
        assert_eq!(store.progressing_column_ids(), ["doing".to_string()]);
    }
}
