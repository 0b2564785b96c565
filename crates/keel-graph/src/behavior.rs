//! Build-behavior policy: which coordinates seed the traversal, which count
//! as workspace projects, and which variant represents each node.
//!
//! The variants form a tagged sum dispatched uniformly by the graph builder;
//! the policy itself carries no state beyond its tag — the indices and the
//! selected set live in the builder.

use rustc_hash::FxHashSet;

use keel_model::{Outcome, Problem, ProjectId};

use crate::index::WorkspaceIndex;

/// The `--also-make` family of modes as given by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakeMode {
    /// Build selected projects and everything they depend on.
    Upstream,
    /// Build selected projects and everything depending on them.
    Downstream,
    /// Both directions; not supported.
    Both,
}

/// Resolved build behavior for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakePolicy {
    /// No selection: every source project is built from source.
    All,
    /// Only the selected projects build from source; everything else they
    /// pull in is satisfied from the binary index.
    SelectedOnly,
    /// Selected projects plus their dependency closure, all from source.
    Upstream,
    /// Every source project is visited; non-selected projects fall back to
    /// their binary variant when that variant is independent of source.
    Downstream,
}

/// Decide the policy for the session's selection and mode.
///
/// Modes that satisfy references from previously built artifacts need a
/// binary index; requesting them without one is fatal, as is the unsupported
/// `Both` mode.
pub fn create_policy(
    selected: &FxHashSet<ProjectId>,
    mode: Option<MakeMode>,
    has_binary_index: bool,
) -> Outcome<MakePolicy> {
    if selected.is_empty() {
        return Outcome::success(MakePolicy::All);
    }
    match mode {
        None => {
            if has_binary_index {
                Outcome::success(MakePolicy::SelectedOnly)
            } else {
                Outcome::error(vec![Problem::fatal(
                    "Binary projects required to build selected projects",
                    "",
                )])
            }
        }
        Some(MakeMode::Upstream) => Outcome::success(MakePolicy::Upstream),
        Some(MakeMode::Downstream) => {
            if has_binary_index {
                Outcome::success(MakePolicy::Downstream)
            } else {
                Outcome::error(vec![Problem::fatal(
                    "Binary projects required to build projects and dependents",
                    "",
                )])
            }
        }
        Some(MakeMode::Both) => Outcome::error(vec![Problem::fatal(
            "The 'both' make behavior is not supported",
            "",
        )]),
    }
}

impl MakePolicy {
    /// Coordinates the traversal starts from, in index order.
    pub fn seeds(
        self,
        source: &WorkspaceIndex,
        selected: &FxHashSet<ProjectId>,
    ) -> Vec<ProjectId> {
        match self {
            MakePolicy::All | MakePolicy::Downstream => source.ids().cloned().collect(),
            MakePolicy::SelectedOnly | MakePolicy::Upstream => source
                .ids()
                .filter(|id| selected.contains(id))
                .cloned()
                .collect(),
        }
    }

    /// Whether a referenced coordinate is part of the workspace, as opposed
    /// to an external artifact the resolver deals with.
    pub fn is_project(
        self,
        id: &ProjectId,
        source: &WorkspaceIndex,
        binary: Option<&WorkspaceIndex>,
    ) -> bool {
        match self {
            MakePolicy::All | MakePolicy::Upstream => source.contains(id),
            MakePolicy::SelectedOnly | MakePolicy::Downstream => {
                source.contains(id) || binary.is_some_and(|index| index.contains(id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_model::Descriptor;

    fn id(name: &str) -> ProjectId {
        ProjectId::new("g", name).unwrap()
    }

    fn index(names: &[&str]) -> WorkspaceIndex {
        let descriptors = names
            .iter()
            .map(|name| {
                let mut descriptor = Descriptor::named(*name);
                descriptor.group = Some("g".into());
                descriptor.version = Some("1".into());
                descriptor
            })
            .collect();
        WorkspaceIndex::build(descriptors).into_value().unwrap()
    }

    #[test]
    fn empty_selection_is_all_regardless_of_mode() {
        let none = FxHashSet::default();
        assert_eq!(
            create_policy(&none, Some(MakeMode::Downstream), false)
                .into_value()
                .unwrap(),
            MakePolicy::All
        );
    }

    #[test]
    fn selected_only_requires_binary_index() {
        let selected = FxHashSet::from_iter([id("a")]);
        assert!(create_policy(&selected, None, false).has_errors());
        assert_eq!(
            create_policy(&selected, None, true).into_value().unwrap(),
            MakePolicy::SelectedOnly
        );
    }

    #[test]
    fn downstream_requires_binary_index() {
        let selected = FxHashSet::from_iter([id("a")]);
        assert!(create_policy(&selected, Some(MakeMode::Downstream), false).has_errors());
        assert_eq!(
            create_policy(&selected, Some(MakeMode::Downstream), true)
                .into_value()
                .unwrap(),
            MakePolicy::Downstream
        );
    }

    #[test]
    fn both_mode_is_rejected() {
        let selected = FxHashSet::from_iter([id("a")]);
        let result = create_policy(&selected, Some(MakeMode::Both), true);
        assert!(result.has_errors());
        assert!(result.problems()[0].message.contains("not supported"));
    }

    #[test]
    fn seeds_follow_index_order() {
        let source = index(&["c", "a", "b"]);
        let selected = FxHashSet::from_iter([id("a"), id("c")]);

        let all: Vec<_> = MakePolicy::All
            .seeds(&source, &selected)
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(all, vec!["c", "a", "b"]);

        let upstream: Vec<_> = MakePolicy::Upstream
            .seeds(&source, &selected)
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(upstream, vec!["c", "a"]);
    }

    #[test]
    fn is_project_consults_binary_index_per_mode() {
        let source = index(&["a"]);
        let binary = index(&["b"]);

        assert!(!MakePolicy::All.is_project(&id("b"), &source, Some(&binary)));
        assert!(!MakePolicy::Upstream.is_project(&id("b"), &source, Some(&binary)));
        assert!(MakePolicy::SelectedOnly.is_project(&id("b"), &source, Some(&binary)));
        assert!(MakePolicy::Downstream.is_project(&id("b"), &source, Some(&binary)));
        assert!(MakePolicy::SelectedOnly.is_project(&id("a"), &source, Some(&binary)));
    }
}
