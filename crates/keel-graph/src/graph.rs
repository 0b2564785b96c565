//! The project graph: an arena of nodes plus a topological order.
//!
//! All cross-references between projects are [`NodeId`] handles resolved
//! through the graph, so the cyclic-looking object relations (parent
//! up-edges, dependency out-edges, dependent back-edges) never turn into
//! cyclic ownership.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use keel_model::{Descriptor, ProjectId};

/// Handle to a node in the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A fully built project: its effective descriptor, the variant it was built
/// from, and handles to every project it references.
///
/// Serializable so tooling can dump the planned graph.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectNode {
    pub id: ProjectId,
    /// Effective descriptor after the full pipeline.
    pub descriptor: Descriptor,
    /// Raw descriptor the pipeline started from; lineage walks of child
    /// projects read this, never the effective form.
    pub raw: Descriptor,
    /// True when built from the source variant.
    pub source: bool,
    pub parent: Option<NodeId>,
    pub imports: Vec<NodeId>,
    pub plugins: Vec<NodeId>,
    pub dependencies: Vec<NodeId>,
    /// Whether this node is, or transitively references, a source-variant
    /// project. Drives the binary-fallback decisions.
    pub references_source: bool,
}

impl ProjectNode {
    /// All outgoing references, parent included.
    pub fn references(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parent
            .into_iter()
            .chain(self.imports.iter().copied())
            .chain(self.plugins.iter().copied())
            .chain(self.dependencies.iter().copied())
    }
}

/// Topologically sorted project graph.
///
/// `sorted` lists the chosen node per coordinate in an order where every
/// referenced node precedes its referrer. The arena may additionally hold
/// variant nodes that were built but not chosen; they are reachable only as
/// build artifacts, never from `sorted`.
#[derive(Debug)]
pub struct ProjectGraph {
    nodes: Vec<ProjectNode>,
    sorted: Vec<NodeId>,
    by_id: FxHashMap<ProjectId, NodeId>,
    dependents: FxHashMap<NodeId, Vec<NodeId>>,
}

impl ProjectGraph {
    pub(crate) fn new(nodes: Vec<ProjectNode>, sorted: Vec<NodeId>) -> Self {
        let mut by_id = FxHashMap::default();
        let mut dependents: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for node_id in &sorted {
            let node = &nodes[node_id.index()];
            by_id.insert(node.id.clone(), *node_id);
            for referenced in node.references() {
                dependents.entry(referenced).or_default().push(*node_id);
            }
        }
        Self {
            nodes,
            sorted,
            by_id,
            dependents,
        }
    }

    pub fn node(&self, id: NodeId) -> &ProjectNode {
        &self.nodes[id.index()]
    }

    pub fn find(&self, id: &ProjectId) -> Option<NodeId> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Projects in topological order: every node appears after everything it
    /// references.
    pub fn sorted_projects(&self) -> impl Iterator<Item = &ProjectNode> {
        self.sorted.iter().map(|id| &self.nodes[id.index()])
    }

    /// Projects the given node references (its out-edge closure when
    /// `transitive`).
    pub fn upstream_projects(&self, node: NodeId, transitive: bool) -> Vec<NodeId> {
        if !transitive {
            return dedup_in_order(self.node(node).references());
        }
        self.closure(node, |n| dedup_in_order(self.node(n).references()))
    }

    /// Projects that reference the given node (its in-edge closure when
    /// `transitive`).
    pub fn downstream_projects(&self, node: NodeId, transitive: bool) -> Vec<NodeId> {
        let direct = |n: NodeId| self.dependents.get(&n).cloned().unwrap_or_default();
        if !transitive {
            return direct(node);
        }
        self.closure(node, direct)
    }

    fn closure(&self, start: NodeId, edges: impl Fn(NodeId) -> Vec<NodeId>) -> Vec<NodeId> {
        let mut seen = FxHashSet::from_iter([start]);
        let mut queue = std::collections::VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for next in edges(current) {
                if seen.insert(next) {
                    out.push(next);
                    queue.push_back(next);
                }
            }
        }
        out
    }
}

fn dedup_in_order(ids: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(group: &str, name: &str, dependencies: Vec<NodeId>) -> ProjectNode {
        let mut descriptor = Descriptor::named(name);
        descriptor.group = Some(group.into());
        ProjectNode {
            id: ProjectId::new(group, name).unwrap(),
            descriptor: descriptor.clone(),
            raw: descriptor,
            source: true,
            parent: None,
            imports: Vec::new(),
            plugins: Vec::new(),
            dependencies,
            references_source: true,
        }
    }

    /// c <- b <- a, plus a standalone d depending on c.
    fn diamond_free_graph() -> ProjectGraph {
        let c = node("g", "c", vec![]);
        let b = node("g", "b", vec![NodeId(0)]);
        let a = node("g", "a", vec![NodeId(1)]);
        let d = node("g", "d", vec![NodeId(0)]);
        ProjectGraph::new(vec![c, b, a, d], vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)])
    }

    #[test]
    fn sorted_projects_follow_given_order() {
        let graph = diamond_free_graph();
        let names: Vec<_> = graph.sorted_projects().map(|n| n.id.name()).collect();
        assert_eq!(names, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn direct_and_transitive_upstream() {
        let graph = diamond_free_graph();
        let a = graph.find(&ProjectId::new("g", "a").unwrap()).unwrap();

        let direct = graph.upstream_projects(a, false);
        assert_eq!(direct, vec![NodeId(1)]);

        let transitive = graph.upstream_projects(a, true);
        assert_eq!(transitive, vec![NodeId(1), NodeId(0)]);
    }

    #[test]
    fn direct_and_transitive_downstream() {
        let graph = diamond_free_graph();
        let c = graph.find(&ProjectId::new("g", "c").unwrap()).unwrap();

        let direct = graph.downstream_projects(c, false);
        assert_eq!(direct, vec![NodeId(1), NodeId(3)]);

        let transitive = graph.downstream_projects(c, true);
        assert_eq!(transitive, vec![NodeId(1), NodeId(3), NodeId(2)]);
    }

    #[test]
    fn references_include_parent() {
        let base = node("g", "base", vec![]);
        let mut child = node("g", "child", vec![]);
        child.parent = Some(NodeId(0));
        let graph = ProjectGraph::new(vec![base, child], vec![NodeId(0), NodeId(1)]);

        let child_id = graph.find(&ProjectId::new("g", "child").unwrap()).unwrap();
        assert_eq!(graph.upstream_projects(child_id, false), vec![NodeId(0)]);
        let base_id = graph.find(&ProjectId::new("g", "base").unwrap()).unwrap();
        assert_eq!(graph.downstream_projects(base_id, false), vec![NodeId(1)]);
    }
}
