use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::cycle_color;
use crate::model::ids::IdGenerator;
use crate::model::label::{LABEL_PALETTE, Label, LabelPatch};
use crate::ops::is_permutation;

/// Flat ordered collection of labels.
#[derive(Debug, Clone, Default)]
pub struct LabelStore {
    labels: IndexMap<String, Label>,
}

impl LabelStore {
    pub fn from_vec(labels: Vec<Label>) -> Self {
        LabelStore {
            labels: labels.into_iter().map(|l| (l.id.clone(), l)).collect(),
        }
    }

    pub fn to_vec(&self) -> Vec<Label> {
        self.labels.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Label> {
        self.labels.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.labels.contains_key(id)
    }

    /// Look a label up by id, falling back to an exact name match.
    pub fn resolve(&self, id_or_name: &str) -> Option<&Label> {
        self.labels
            .get(id_or_name)
            .or_else(|| self.labels.values().find(|l| l.name == id_or_name))
    }

    pub fn add(&mut self, ids: &mut IdGenerator, name: &str, color: Option<&str>) -> String {
        let id = ids.next("label-", |candidate| self.labels.contains_key(candidate));
        let color = color
            .map(str::to_string)
            .unwrap_or_else(|| cycle_color(&LABEL_PALETTE, self.labels.len()));
        self.labels.insert(
            id.clone(),
            Label {
                id: id.clone(),
                name: name.to_string(),
                color,
            },
        );
        id
    }

    pub fn update(&mut self, id: &str, patch: LabelPatch) -> bool {
        match self.labels.get_mut(id) {
            Some(label) => label.apply(patch),
            None => false,
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        self.labels.shift_remove(id).is_some()
    }

    pub fn reorder(&mut self, ordered_ids: &[String]) -> bool {
        if !is_permutation(ordered_ids, self.labels.keys().map(String::as_str)) {
            return false;
        }
        let rank: HashMap<&str, usize> = ordered_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        self.labels
            .sort_by(|a, _, b, _| rank.get(a.as_str()).cmp(&rank.get(b.as_str())));
        true
    }
}
