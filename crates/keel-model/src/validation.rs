//! Descriptor rule validation.
//!
//! Two rule sets run at different points of the pipeline: raw rules right
//! after parsing, effective rules at the end of enablement. How strict each
//! set is depends on the requested [`ValidationLevel`].

use rustc_hash::FxHashSet;

use crate::descriptor::Descriptor;
use crate::problem::{Problem, Severity};

/// How strictly descriptor rules are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationLevel {
    /// Only rules the pipeline cannot work without.
    Minimal,
    /// The default contract for workspace descriptors.
    #[default]
    Standard,
    /// Everything, including advisory hygiene rules.
    Strict,
}

/// Validate a freshly parsed descriptor.
///
/// Problems are appended to `problems` in rule order. A fatal problem means
/// the descriptor cannot enter the workspace at all.
pub fn validate_raw(descriptor: &Descriptor, level: ValidationLevel, problems: &mut Vec<Problem>) {
    let source = descriptor.source_hint();

    if descriptor.name.trim().is_empty() {
        problems.push(Problem::fatal("'name' is missing", source.clone()));
    }
    if descriptor.project_id().is_none() && !descriptor.name.trim().is_empty() {
        problems.push(Problem::fatal(
            "'group' is missing and no parent declares one",
            source.clone(),
        ));
    }

    for (field, value) in [
        ("group", descriptor.group.as_deref()),
        ("name", Some(descriptor.name.as_str())),
    ] {
        if value.is_some_and(contains_expression) {
            problems.push(Problem::error(
                format!("'{field}' must not contain expressions"),
                source.clone(),
            ));
        }
    }

    if let Some(parent) = &descriptor.parent {
        if parent.group.is_empty() || parent.name.is_empty() {
            problems.push(Problem::fatal(
                "'parent' must declare group and name",
                source.clone(),
            ));
        }
        if parent.version.is_empty() {
            problems.push(Problem::fatal(
                "'parent.version' is missing",
                source.clone(),
            ));
        }
        if [&parent.group, &parent.name, &parent.version]
            .iter()
            .any(|v| contains_expression(v.as_str()))
        {
            problems.push(Problem::error(
                "'parent' must not contain expressions",
                source.clone(),
            ));
        }
    }

    if level >= ValidationLevel::Standard && descriptor.raw_version().is_none() {
        problems.push(Problem::error("'version' is missing", source.clone()));
    }

    validate_modules(descriptor, &source, problems);
    validate_raw_lists(descriptor, level, &source, problems);
    validate_profiles(descriptor, &source, problems);
}

fn validate_modules(descriptor: &Descriptor, source: &str, problems: &mut Vec<Problem>) {
    let mut seen = FxHashSet::default();
    for module in &descriptor.modules {
        if module.trim().is_empty() {
            problems.push(Problem::error("'modules' contains an empty entry", source));
            continue;
        }
        if !seen.insert(module.as_str()) {
            problems.push(Problem::error(
                format!("'modules' lists {module} more than once"),
                source,
            ));
        }
        if contains_expression(module) {
            problems.push(Problem::error(
                format!("module {module} must not contain expressions"),
                source,
            ));
        }
    }
}

fn validate_raw_lists(
    descriptor: &Descriptor,
    level: ValidationLevel,
    source: &str,
    problems: &mut Vec<Problem>,
) {
    for dependency in descriptor
        .dependencies
        .iter()
        .chain(&descriptor.managed_dependencies)
    {
        if dependency.group.is_empty() || dependency.name.is_empty() {
            problems.push(Problem::error(
                "dependency is missing group or name",
                source,
            ));
        }
        if dependency.is_import() && dependency.version.is_none() {
            problems.push(Problem::error(
                format!(
                    "import of {}:{} must declare a version",
                    dependency.group, dependency.name
                ),
                source,
            ));
        }
    }

    for plugin in descriptor.plugins.iter().chain(&descriptor.managed_plugins) {
        if plugin.group.is_empty() || plugin.name.is_empty() {
            problems.push(Problem::error("plugin is missing group or name", source));
        }
    }

    if level >= ValidationLevel::Strict {
        if let Some(version) = &descriptor.version {
            if contains_expression(version) {
                problems.push(Problem::warning(
                    "'version' contains an expression; parent resolution sees it unexpanded",
                    source,
                ));
            }
        }
    }
}

fn validate_profiles(descriptor: &Descriptor, source: &str, problems: &mut Vec<Problem>) {
    let mut seen = FxHashSet::default();
    for profile in &descriptor.profiles {
        if profile.id.trim().is_empty() {
            problems.push(Problem::error("profile is missing an id", source));
        } else if !seen.insert(profile.id.as_str()) {
            problems.push(Problem::error(
                format!("duplicate profile id {}", profile.id),
                source,
            ));
        }
        // The module set is fixed before profiles are evaluated; letting a
        // profile add modules would make aggregation activation-dependent.
        if !profile.modules.is_empty() {
            problems.push(Problem::error(
                format!("profile {} must not declare modules", profile.id),
                source,
            ));
        }
    }
}

/// Validate a fully assembled effective descriptor.
pub fn validate_effective(
    descriptor: &Descriptor,
    level: ValidationLevel,
    problems: &mut Vec<Problem>,
) {
    let source = descriptor.source_hint();

    if descriptor.group.is_none() {
        problems.push(Problem::error(
            "effective descriptor has no group",
            source.clone(),
        ));
    }
    if descriptor.version.is_none() {
        problems.push(Problem::error(
            "effective descriptor has no version",
            source.clone(),
        ));
    }

    for dependency in &descriptor.dependencies {
        if dependency.version.is_none() {
            problems.push(Problem::new(
                if level >= ValidationLevel::Standard {
                    Severity::Error
                } else {
                    Severity::Warning
                },
                format!(
                    "dependency {}:{} has no version and none is managed",
                    dependency.group, dependency.name
                ),
                source.clone(),
            ));
        }
    }

    let mut repo_ids = FxHashSet::default();
    for repository in &descriptor.repositories {
        if repository.id.is_empty() || repository.url.is_empty() {
            problems.push(Problem::error(
                "repository is missing id or url",
                source.clone(),
            ));
        } else if !repo_ids.insert(repository.id.as_str()) {
            problems.push(Problem::error(
                format!("duplicate repository id {}", repository.id),
                source.clone(),
            ));
        }
    }
}

fn contains_expression(value: &str) -> bool {
    value.contains("${")
}
