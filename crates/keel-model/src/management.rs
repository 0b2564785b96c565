//! Dependency and plugin management transforms used during enablement.

use rustc_hash::FxHashMap;

use crate::descriptor::{Dependency, Descriptor, Plugin};
use crate::problem::Problem;
use crate::validation::ValidationLevel;

/// Optional hook that contributes default lifecycle plugin bindings during
/// enablement. Skipped entirely when the session provides none.
pub trait LifecycleInjector {
    fn inject(&self, descriptor: &mut Descriptor, problems: &mut Vec<Problem>);
}

/// Merge duplicate dependency and plugin declarations by identity key.
///
/// The first declaration wins; later duplicates are dropped with a warning.
pub fn merge_duplicates(descriptor: &mut Descriptor, problems: &mut Vec<Problem>) {
    let source = descriptor.source_hint();

    dedupe(&mut descriptor.dependencies, |d| {
        (d.group.clone(), d.name.clone())
    })
    .into_iter()
    .for_each(|(group, name)| {
        problems.push(Problem::warning(
            format!("duplicate dependency declaration {group}:{name}"),
            source.clone(),
        ));
    });

    dedupe(&mut descriptor.managed_dependencies, |d| {
        (d.group.clone(), d.name.clone())
    })
    .into_iter()
    .for_each(|(group, name)| {
        problems.push(Problem::warning(
            format!("duplicate managed dependency declaration {group}:{name}"),
            source.clone(),
        ));
    });

    dedupe(&mut descriptor.plugins, |p| {
        (p.group.clone(), p.name.clone())
    })
    .into_iter()
    .for_each(|(group, name)| {
        problems.push(Problem::warning(
            format!("duplicate plugin declaration {group}:{name}"),
            source.clone(),
        ));
    });
}

fn dedupe<T, K: std::hash::Hash + Eq + Clone>(
    items: &mut Vec<T>,
    key: impl Fn(&T) -> K,
) -> Vec<K> {
    let mut seen = rustc_hash::FxHashSet::default();
    let mut duplicates = Vec::new();
    items.retain(|item| {
        let k = key(item);
        if seen.insert(k.clone()) {
            true
        } else {
            duplicates.push(k);
            false
        }
    });
    duplicates
}

/// Merge imported dependency-management sections into the descriptor.
///
/// Imports contribute in source order; entries already managed by the
/// descriptor itself (or by an earlier import) win.
pub fn import_management(descriptor: &mut Descriptor, imported: Vec<Vec<Dependency>>) {
    for section in imported {
        for dependency in section {
            if dependency.is_import() {
                continue;
            }
            if !descriptor
                .managed_dependencies
                .iter()
                .any(|d| d.key() == dependency.key())
            {
                descriptor.managed_dependencies.push(dependency);
            }
        }
    }
}

/// Propagate managed versions and scopes to dependencies that omit them.
pub fn inject_dependency_management(descriptor: &mut Descriptor) {
    let managed: FxHashMap<(String, String), Dependency> = descriptor
        .managed_dependencies
        .iter()
        .filter(|d| !d.is_import())
        .map(|d| ((d.group.clone(), d.name.clone()), d.clone()))
        .collect();

    for dependency in &mut descriptor.dependencies {
        let Some(entry) = managed.get(&(dependency.group.clone(), dependency.name.clone())) else {
            continue;
        };
        if dependency.version.is_none() {
            dependency.version = entry.version.clone();
        }
    }
}

/// Propagate managed plugin versions and configuration to plugin
/// declarations that omit them.
pub fn inject_plugin_management(descriptor: &mut Descriptor) {
    let managed: FxHashMap<(String, String), Plugin> = descriptor
        .managed_plugins
        .iter()
        .map(|p| ((p.group.clone(), p.name.clone()), p.clone()))
        .collect();

    for plugin in &mut descriptor.plugins {
        let Some(entry) = managed.get(&(plugin.group.clone(), plugin.name.clone())) else {
            continue;
        };
        if plugin.version.is_none() {
            plugin.version = entry.version.clone();
        }
        for (key, value) in &entry.config {
            plugin
                .config
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// Drop entries that cannot carry semantics after import resolution and make
/// implicit defaults explicit.
///
/// Import entries have been consumed by this point; keeping them around
/// would make the managed section lie about what is pinned.
pub fn inject_defaults(descriptor: &mut Descriptor) {
    descriptor.managed_dependencies.retain(|d| !d.is_import());

    for plugin in &mut descriptor.plugins {
        if plugin.executions.is_empty() {
            continue;
        }
        let mut seen = rustc_hash::FxHashSet::default();
        plugin.executions.retain(|e| seen.insert(e.id.clone()));
    }
}

/// Copy plugin-level configuration into each execution's configuration.
/// Execution-level settings win on conflicts.
pub fn expand_plugin_configuration(descriptor: &mut Descriptor) {
    for plugin in &mut descriptor.plugins {
        if plugin.config.is_empty() {
            continue;
        }
        for execution in &mut plugin.executions {
            for (key, value) in &plugin.config {
                execution
                    .config
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

/// Warn about plugins that end up with neither a direct nor a managed
/// version after lineage assembly.
pub fn check_plugin_versions(
    descriptor: &Descriptor,
    level: ValidationLevel,
    problems: &mut Vec<Problem>,
) {
    if level < ValidationLevel::Standard {
        return;
    }
    let source = descriptor.source_hint();
    for plugin in &descriptor.plugins {
        let managed = descriptor
            .managed_plugins
            .iter()
            .find(|p| p.key() == plugin.key())
            .and_then(|p| p.version.as_ref());
        if plugin.version.is_none() && managed.is_none() {
            problems.push(Problem::warning(
                format!(
                    "'plugins.plugin.version' for {}:{} is missing",
                    plugin.group, plugin.name
                ),
                source.clone(),
            ));
        }
    }
}
