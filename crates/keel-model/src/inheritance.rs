//! Parent-to-child inheritance assembly.
//!
//! Assembly works element-wise over the descriptor: the child wins on scalar
//! conflicts, list-valued sections merge by identity key. Aggregation
//! (`modules`) and the parent reference itself are never inherited, and
//! profiles are gone by this point (already injected during activation).

use crate::descriptor::{Dependency, Descriptor, Plugin};
use crate::interpolation::normalize_url;

/// Merge a parent descriptor into a child, producing the assembled result.
///
/// Both inputs are activated descriptors; the caller folds the lineage
/// bottom-up, feeding each result back in as the new child.
pub fn assemble(child: &Descriptor, parent: &Descriptor) -> Descriptor {
    let mut merged = child.clone();

    if merged.group.is_none() {
        merged.group = parent.group.clone();
    }
    if merged.version.is_none() {
        merged.version = parent.version.clone();
    }
    merged.url = match (&child.url, &parent.url) {
        (Some(url), _) => Some(url.clone()),
        (None, Some(parent_url)) => Some(normalize_url(&append_segment(
            parent_url,
            child_dir_name(child),
        ))),
        (None, None) => None,
    };

    for (key, value) in &parent.properties {
        merged
            .properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    merge_dependencies(&mut merged.dependencies, &parent.dependencies);
    merge_dependencies(&mut merged.managed_dependencies, &parent.managed_dependencies);
    merge_plugins(&mut merged.plugins, &parent.plugins);
    merge_plugins(&mut merged.managed_plugins, &parent.managed_plugins);

    for repository in &parent.repositories {
        if !merged.repositories.iter().any(|r| r.id == repository.id) {
            merged.repositories.push(repository.clone());
        }
    }

    merged
}

/// Fold a lineage into one assembled descriptor.
///
/// `lineage` is ordered child-first and ends with the super-descriptor; the
/// fold starts at the top and merges downwards so nearer ancestors win.
pub fn assemble_lineage(lineage: &[Descriptor]) -> Descriptor {
    let mut iter = lineage.iter().rev();
    let Some(root) = iter.next() else {
        return Descriptor::default();
    };
    iter.fold(root.clone(), |effective, child| assemble(child, &effective))
}

fn merge_dependencies(child: &mut Vec<Dependency>, parent: &[Dependency]) {
    for dependency in parent {
        if !child.iter().any(|d| d.key() == dependency.key()) {
            child.push(dependency.clone());
        }
    }
}

fn merge_plugins(child: &mut Vec<Plugin>, parent: &[Plugin]) {
    for plugin in parent {
        match child.iter_mut().find(|p| p.key() == plugin.key()) {
            Some(existing) => {
                if existing.version.is_none() {
                    existing.version = plugin.version.clone();
                }
                for (key, value) in &plugin.config {
                    existing
                        .config
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                for execution in &plugin.executions {
                    if !existing.executions.iter().any(|e| e.id == execution.id) {
                        existing.executions.push(execution.clone());
                    }
                }
            }
            None => child.push(plugin.clone()),
        }
    }
}

fn child_dir_name(child: &Descriptor) -> &str {
    child
        .base_dir()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or(child.name.as_str())
}

fn append_segment(url: &str, segment: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/{segment}")
}
