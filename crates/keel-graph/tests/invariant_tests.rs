//! Structural invariants of the produced graph.

mod helpers;

use std::collections::HashSet;

use helpers::Workspace;
use keel_graph::{ProjectGraph, Session};

fn diamond_workspace() -> Workspace {
    let workspace = Workspace::new();
    workspace.write(
        "",
        r#"
group = "com.x"
name = "root"
version = "1"
modules = ["app", "lib1", "lib2", "base"]
"#,
    );
    workspace.write(
        "app",
        r#"
group = "com.x"
name = "app"
version = "1"

[[dependencies]]
group = "com.x"
name = "lib1"
version = "1"

[[dependencies]]
group = "com.x"
name = "lib2"
version = "1"
"#,
    );
    for lib in ["lib1", "lib2"] {
        workspace.write(
            lib,
            &format!(
                r#"
group = "com.x"
name = "{lib}"
version = "1"

[[dependencies]]
group = "com.x"
name = "base"
version = "1"
"#
            ),
        );
    }
    workspace.write(
        "base",
        r#"
group = "com.x"
name = "base"
version = "1"
"#,
    );
    workspace
}

fn assert_topological(graph: &ProjectGraph) {
    let nodes: Vec<_> = graph.sorted_projects().collect();
    for (index, node) in nodes.iter().enumerate() {
        for referenced in graph.upstream_projects(graph.find(&node.id).unwrap(), false) {
            let referenced_id = &graph.node(referenced).id;
            let referenced_index = nodes
                .iter()
                .position(|candidate| candidate.id == *referenced_id)
                .expect("referenced project is in the sorted sequence");
            assert!(
                referenced_index < index,
                "{referenced_id} must precede {}",
                node.id
            );
        }
    }
}

#[test]
fn sorted_projects_is_a_topological_order() {
    let workspace = diamond_workspace();
    let result = Session::new(workspace.root()).plan();
    assert!(!result.has_errors(), "problems: {:?}", result.problems());
    assert_topological(result.value().unwrap());
}

#[test]
fn no_coordinate_appears_twice() {
    let workspace = diamond_workspace();
    let result = Session::new(workspace.root()).plan();
    let graph = result.value().unwrap();

    let mut seen = HashSet::new();
    for node in graph.sorted_projects() {
        assert!(seen.insert(node.id.clone()), "{} appears twice", node.id);
    }
}

#[test]
fn all_mode_covers_exactly_the_source_index() {
    let workspace = diamond_workspace();
    let result = Session::new(workspace.root()).plan();
    let graph = result.value().unwrap();

    let names: HashSet<_> = graph
        .sorted_projects()
        .map(|node| node.id.name().to_string())
        .collect();
    let expected: HashSet<_> = ["root", "app", "lib1", "lib2", "base"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(names, expected);
    assert!(graph.sorted_projects().all(|node| node.source));
}

#[test]
fn planning_is_idempotent() {
    let workspace = diamond_workspace();
    let session = Session::new(workspace.root());

    let first = session.plan();
    let second = session.plan();
    assert!(!first.has_errors());
    assert!(!second.has_errors());

    let order = |graph: &ProjectGraph| {
        graph
            .sorted_projects()
            .map(|node| node.id.to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(first.value().unwrap()), order(second.value().unwrap()));
}

#[test]
fn upstream_and_downstream_queries_agree() {
    let workspace = diamond_workspace();
    let result = Session::new(workspace.root()).plan();
    let graph = result.value().unwrap();

    let find = |name: &str| {
        graph
            .find(&keel_graph::model::ProjectId::new("com.x", name).unwrap())
            .unwrap()
    };
    let app = find("app");
    let base = find("base");

    let upstream = graph.upstream_projects(app, true);
    assert!(upstream.contains(&base));
    assert_eq!(upstream.len(), 3);

    let downstream = graph.downstream_projects(base, true);
    assert!(downstream.contains(&app));
    assert_eq!(downstream.len(), 3);

    // direct neighbours only, when not transitive
    assert_eq!(graph.upstream_projects(app, false).len(), 2);
    assert_eq!(graph.downstream_projects(base, false).len(), 2);
}
