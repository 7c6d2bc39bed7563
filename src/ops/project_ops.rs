use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::ids::IdGenerator;
use crate::model::project::{PROJECT_PALETTE, Project, ProjectPatch};
use crate::model::cycle_color;
use crate::ops::is_permutation;

/// Ordered collection of projects. Position in the map is display order.
#[derive(Debug, Clone, Default)]
pub struct ProjectStore {
    projects: IndexMap<String, Project>,
    active_project_id: Option<String>,
}

impl ProjectStore {
    pub fn from_parts(projects: Vec<Project>, active_project_id: Option<String>) -> Self {
        let projects: IndexMap<String, Project> =
            projects.into_iter().map(|p| (p.id.clone(), p)).collect();
        let active_project_id = active_project_id.filter(|id| projects.contains_key(id));
        ProjectStore {
            projects,
            active_project_id,
        }
    }

    pub fn to_vec(&self) -> Vec<Project> {
        self.projects.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.projects.contains_key(id)
    }

    /// Look a project up by id, falling back to an exact name match.
    pub fn resolve(&self, id_or_name: &str) -> Option<&Project> {
        self.projects
            .get(id_or_name)
            .or_else(|| self.projects.values().find(|p| p.name == id_or_name))
    }

    pub fn active_project_id(&self) -> Option<&str> {
        self.active_project_id.as_deref()
    }

    /// Create a project. Without an explicit colour one is picked from the
    /// palette by creation index.
    pub fn add(&mut self, ids: &mut IdGenerator, name: &str, color: Option<&str>) -> String {
        let id = ids.next("proj-", |candidate| self.projects.contains_key(candidate));
        let color = color
            .map(str::to_string)
            .unwrap_or_else(|| cycle_color(&PROJECT_PALETTE, self.projects.len()));
        self.projects.insert(
            id.clone(),
            Project {
                id: id.clone(),
                name: name.to_string(),
                color,
                icon: None,
            },
        );
        id
    }

    pub fn update(&mut self, id: &str, patch: ProjectPatch) -> bool {
        match self.projects.get_mut(id) {
            Some(project) => project.apply(patch),
            None => false,
        }
    }

    /// Remove a project. Tasks that reference it are left alone.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.projects.shift_remove(id).is_none() {
            return false;
        }
        if self.active_project_id.as_deref() == Some(id) {
            self.active_project_id = None;
        }
        true
    }

    pub fn reorder(&mut self, ordered_ids: &[String]) -> bool {
        if !is_permutation(ordered_ids, self.projects.keys().map(String::as_str)) {
            return false;
        }
        let rank: HashMap<&str, usize> = ordered_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        self.projects
            .sort_by(|a, _, b, _| rank.get(a.as_str()).cmp(&rank.get(b.as_str())));
        true
    }

    /// Set (or clear) the project new tasks default to. Unknown ids are ignored.
    pub fn set_active(&mut self, id: Option<&str>) -> bool {
        if let Some(id) = id
            && !self.projects.contains_key(id)
        {
            return false;
        }
        let next = id.map(str::to_string);
        if self.active_project_id == next {
            return false;
        }
        self.active_project_id = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(names: &[&str]) -> (ProjectStore, Vec<String>) {
        let mut ids = IdGenerator::new();
        let mut store = ProjectStore::default();
        let added = names.iter().map(|n| store.add(&mut ids, n, None)).collect();
        (store, added)
    }

    #[test]
    fn add_cycles_palette() {
        let (store, ids) = store_with(&["a", "b"]);
        assert!(ids[0].starts_with("proj-"));
        assert_eq!(store.get(&ids[0]).unwrap().color, "blue");
        assert_eq!(store.get(&ids[1]).unwrap().color, "red");
    }

    #[test]
    fn explicit_color_wins() {
        let mut ids = IdGenerator::new();
        let mut store = ProjectStore::default();
        let id = store.add(&mut ids, "Home", Some("teal"));
        assert_eq!(store.get(&id).unwrap().color, "teal");
    }

    #[test]
    fn update_missing_is_noop() {
        let (mut store, _) = store_with(&["a"]);
        let patch = ProjectPatch {
            name: Some("x".into()),
            ..Default::default()
        };
        assert!(!store.update("nope", patch));
    }

    #[test]
    fn delete_clears_active() {
        let (mut store, ids) = store_with(&["a", "b"]);
        assert!(store.set_active(Some(&ids[0])));
        assert!(store.delete(&ids[0]));
        assert_eq!(store.active_project_id(), None);
        assert!(!store.delete(&ids[0]));
    }

    #[test]
    fn reorder_requires_full_permutation() {
        let (mut store, ids) = store_with(&["a", "b", "c"]);
        let reversed: Vec<String> = ids.iter().rev().cloned().collect();
        assert!(store.reorder(&reversed));
        let names: Vec<&str> = store.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);

        assert!(!store.reorder(&ids[..2]));
        let names: Vec<&str> = store.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn set_active_rejects_unknown() {
        let (mut store, _) = store_with(&["a"]);
        assert!(!store.set_active(Some("proj-0")));
        assert_eq!(store.active_project_id(), None);
    }
}
