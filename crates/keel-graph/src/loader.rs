//! Workspace discovery: the aggregation walk.
//!
//! Starting from the root descriptor file, the loader follows `modules`
//! declarations depth-first and returns the raw descriptor of every module
//! it can reach. The walk never interprets profiles or inheritance — the
//! module set is fixed by raw content alone.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::debug;

use keel_model::reader::{read_descriptor, DescriptorLocator, DescriptorSource};
use keel_model::{Descriptor, Outcome, Problem, ValidationLevel};

/// Load the root descriptor and every descriptor reachable through module
/// aggregation.
///
/// Modules appear before the descriptor that aggregates them, in document
/// order; the root therefore comes last. Seeding the graph builder in this
/// order keeps aggregators behind their modules in the final sort. Parse
/// failures stop descent into that subtree only; missing modules and
/// aggregation cycles are recorded as errors on the aggregating descriptor
/// and skipped.
pub fn load_workspace(root: &Path, locator: &dyn DescriptorLocator) -> Outcome<Vec<Descriptor>> {
    let root = normalize(root);
    let mut walk = Walk {
        locator,
        results: Vec::new(),
        visited: vec![root.clone()],
    };
    walk.load(&root);

    debug!(descriptors = walk.results.len(), "workspace loaded");
    Outcome::collect(walk.results)
}

struct Walk<'a> {
    locator: &'a dyn DescriptorLocator,
    results: Vec<Outcome<Descriptor>>,
    /// Every file ever entered; never unwound, so revisiting along any path
    /// is reported once and not descended again.
    visited: Vec<PathBuf>,
}

impl Walk<'_> {
    fn load(&mut self, file: &Path) {
        let result = read_descriptor(
            &DescriptorSource::file(file),
            ValidationLevel::Strict,
            true,
        );

        let Some(descriptor) = result.value() else {
            // completely failed to parse, keep the failure and stop here
            self.results.push(result);
            return;
        };
        let descriptor = descriptor.clone();

        let mut problems = Vec::new();
        let mut children = Vec::new();
        for module in &descriptor.modules {
            let Some(module_file) = self.module_file(file, module) else {
                problems.push(Problem::error(
                    format!(
                        "Child module {module} of {} does not exist",
                        file.display()
                    ),
                    file.display().to_string(),
                ));
                continue;
            };

            if self.visited.contains(&module_file) {
                let chain = self
                    .visited
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                problems.push(Problem::error(
                    format!(
                        "Child module {} of {} forms aggregation cycle {chain}",
                        module_file.display(),
                        file.display()
                    ),
                    file.display().to_string(),
                ));
                continue;
            }

            self.visited.push(module_file.clone());
            children.push(module_file);
        }

        for child in children {
            self.load(&child);
        }
        self.results.push(result.with_problems(problems));
    }

    /// Resolve a module path fragment to a descriptor file.
    ///
    /// Fragments may use either path separator. A fragment naming a file is
    /// used directly; one naming a directory is handed to the locator.
    fn module_file(&self, file: &Path, module: &str) -> Option<PathBuf> {
        let fragment = module.replace('\\', "/");
        let candidate = normalize(&file.parent()?.join(fragment));
        if candidate.is_file() {
            Some(candidate)
        } else if candidate.is_dir() {
            self.locator.locate(&candidate).map(|p| normalize(&p))
        } else {
            None
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.to_path_buf().clean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_model::{Severity, StandardLocator, DESCRIPTOR_FILE};
    use std::fs;
    use tempfile::TempDir;

    fn write_descriptor(dir: &Path, text: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(DESCRIPTOR_FILE);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn emits_modules_before_their_aggregator() {
        let workspace = TempDir::new().unwrap();
        let root = write_descriptor(
            workspace.path(),
            r#"
group = "com.x"
name = "root"
version = "1"
modules = ["a", "b"]
"#,
        );
        write_descriptor(
            &workspace.path().join("a"),
            r#"
group = "com.x"
name = "a"
version = "1"
modules = ["nested"]
"#,
        );
        write_descriptor(
            &workspace.path().join("a/nested"),
            r#"
group = "com.x"
name = "nested"
version = "1"
"#,
        );
        write_descriptor(
            &workspace.path().join("b"),
            r#"
group = "com.x"
name = "b"
version = "1"
"#,
        );

        let result = load_workspace(&root, &StandardLocator);
        assert!(!result.has_errors());
        let names: Vec<_> = result
            .value()
            .unwrap()
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, vec!["nested", "a", "b", "root"]);
    }

    #[test]
    fn module_fragment_may_name_the_file_itself() {
        let workspace = TempDir::new().unwrap();
        let root = write_descriptor(
            workspace.path(),
            &format!(
                r#"
group = "com.x"
name = "root"
version = "1"
modules = ["a/{DESCRIPTOR_FILE}"]
"#
            ),
        );
        write_descriptor(
            &workspace.path().join("a"),
            r#"
group = "com.x"
name = "a"
version = "1"
"#,
        );

        let result = load_workspace(&root, &StandardLocator);
        assert!(!result.has_errors());
        assert_eq!(result.value().unwrap().len(), 2);
    }

    #[test]
    fn missing_module_is_an_error_on_the_parent() {
        let workspace = TempDir::new().unwrap();
        let root = write_descriptor(
            workspace.path(),
            r#"
group = "com.x"
name = "root"
version = "1"
modules = ["gone"]
"#,
        );

        let result = load_workspace(&root, &StandardLocator);
        assert!(result.has_errors());
        assert!(result
            .problems()
            .iter()
            .any(|p| p.severity == Severity::Error && p.message.contains("does not exist")));
        // the root itself is still loaded
        assert_eq!(result.value().unwrap().len(), 1);
    }

    #[test]
    fn aggregation_cycle_is_reported_and_not_descended() {
        let workspace = TempDir::new().unwrap();
        let root = write_descriptor(
            workspace.path(),
            r#"
group = "com.x"
name = "root"
version = "1"
modules = ["a"]
"#,
        );
        write_descriptor(
            &workspace.path().join("a"),
            r#"
group = "com.x"
name = "a"
version = "1"
modules = [".."]
"#,
        );

        let result = load_workspace(&root, &StandardLocator);
        assert!(result.has_errors());
        assert!(result
            .problems()
            .iter()
            .any(|p| p.message.contains("aggregation cycle")));
        assert_eq!(result.value().unwrap().len(), 2);
    }

    #[test]
    fn parse_failure_stops_that_subtree_only() {
        let workspace = TempDir::new().unwrap();
        let root = write_descriptor(
            workspace.path(),
            r#"
group = "com.x"
name = "root"
version = "1"
modules = ["broken", "ok"]
"#,
        );
        write_descriptor(&workspace.path().join("broken"), "name = ");
        write_descriptor(
            &workspace.path().join("ok"),
            r#"
group = "com.x"
name = "ok"
version = "1"
"#,
        );

        let result = load_workspace(&root, &StandardLocator);
        assert!(result.has_errors());
        let names: Vec<_> = result
            .value()
            .unwrap()
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, vec!["ok", "root"]);
    }
}
