//! Coordinate index over raw descriptors.

use rustc_hash::FxHashMap;

use keel_model::{Descriptor, Outcome, Problem, ProjectId};

/// Unique mapping from coordinate to raw descriptor, keeping the order in
/// which descriptors were indexed.
#[derive(Debug, Default)]
pub struct WorkspaceIndex {
    map: FxHashMap<ProjectId, Descriptor>,
    order: Vec<ProjectId>,
}

impl WorkspaceIndex {
    /// Fold loaded descriptors into an index.
    ///
    /// Two descriptors sharing a coordinate are a workspace-level defect: the
    /// result is a single fatal problem and no index.
    pub fn build(descriptors: Vec<Descriptor>) -> Outcome<Self> {
        let mut index = Self::default();
        for descriptor in descriptors {
            let Some(id) = descriptor.project_id() else {
                // raw validation already reported this descriptor
                continue;
            };
            if index.map.contains_key(&id) {
                return Outcome::error(vec![Problem::fatal(
                    format!("Duplicate project identifiers: {id}"),
                    descriptor.source_hint(),
                )]);
            }
            index.order.push(id.clone());
            index.map.insert(id, descriptor);
        }
        Outcome::success(index)
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Descriptor> {
        self.map.get(id)
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.map.contains_key(id)
    }

    /// Coordinates in indexing order.
    pub fn ids(&self) -> impl Iterator<Item = &ProjectId> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProjectId, &Descriptor)> {
        self.order.iter().map(|id| (id, &self.map[id]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_model::Severity;

    fn descriptor(group: &str, name: &str) -> Descriptor {
        let mut descriptor = Descriptor::named(name);
        descriptor.group = Some(group.into());
        descriptor.version = Some("1".into());
        descriptor
    }

    #[test]
    fn indexes_in_input_order() {
        let result = WorkspaceIndex::build(vec![
            descriptor("com.x", "b"),
            descriptor("com.x", "a"),
        ]);
        let index = result.into_value().unwrap();
        let ids: Vec<_> = index.ids().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["com.x:b", "com.x:a"]);
    }

    #[test]
    fn duplicate_coordinate_is_fatal() {
        let result = WorkspaceIndex::build(vec![
            descriptor("com.x", "same"),
            descriptor("com.x", "same"),
        ]);
        assert!(result.has_errors());
        assert!(result.value().is_none());
        let problem = &result.problems()[0];
        assert_eq!(problem.severity, Severity::Fatal);
        assert!(problem.message.contains("Duplicate project identifiers"));
        assert!(problem.message.contains("com.x:same"));
    }

    #[test]
    fn same_name_different_group_is_fine() {
        let result = WorkspaceIndex::build(vec![
            descriptor("com.x", "same"),
            descriptor("com.y", "same"),
        ]);
        assert!(!result.has_errors());
        assert_eq!(result.value().unwrap().len(), 2);
    }
}
