pub mod column_ops;
pub mod draft;
pub mod hierarchy;
pub mod label_ops;
pub mod project_ops;
pub mod task_ops;
pub mod views;

use std::collections::HashSet;

/// True when `ids` names every member exactly once.
///
/// Reorder payloads come from a UI snapshot that may be stale; anything
/// other than a full permutation of the current members is rejected.
pub(crate) fn is_permutation<'a>(ids: &[String], members: impl Iterator<Item = &'a str>) -> bool {
    let members: HashSet<&str> = members.collect();
    if ids.len() != members.len() {
        return false;
    }
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .all(|id| members.contains(id.as_str()) && seen.insert(id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn permutation_check() {
        let members = ["a", "b", "c"];
        assert!(is_permutation(&ids(&["c", "a", "b"]), members.into_iter()));
        assert!(!is_permutation(&ids(&["a", "b"]), members.into_iter()));
        assert!(!is_permutation(&ids(&["a", "a", "b"]), members.into_iter()));
        assert!(!is_permutation(&ids(&["a", "b", "x"]), members.into_iter()));
        assert!(is_permutation(&[], std::iter::empty()));
    }
}
