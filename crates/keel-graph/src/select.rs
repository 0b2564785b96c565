//! Project selectors (`--projects`).
//!
//! A selector string picks workspace projects either by coordinate or by
//! filesystem location. Selection runs over raw descriptors, before any
//! inheritance or interpolation.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use rustc_hash::FxHashSet;
use thiserror::Error;

use keel_model::{Descriptor, Outcome, Problem, ProjectId};

use crate::index::WorkspaceIndex;

/// One parsed selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `:name` — any project with that name.
    ByName(String),
    /// `group:name` — exactly that coordinate.
    ById(ProjectId),
    /// A path naming a descriptor file.
    ByFile(PathBuf),
    /// A path naming a project directory.
    ByDir(PathBuf),
}

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("invalid selector {0}: contains more than one ':'")]
    ExtraColon(String),

    #[error("invalid selector {0}: name missing")]
    MissingName(String),

    #[error("invalid selector {0}: no file or directory at {1}")]
    NoSuchPath(String, PathBuf),
}

impl Selector {
    /// Parse a selector string, resolving path expressions against
    /// `base_dir`.
    pub fn parse(raw: &str, base_dir: &Path) -> Result<Self, SelectorError> {
        if let Some((group, name)) = raw.split_once(':') {
            if name.contains(':') {
                return Err(SelectorError::ExtraColon(raw.to_string()));
            }
            if name.is_empty() {
                return Err(SelectorError::MissingName(raw.to_string()));
            }
            return Ok(if group.is_empty() {
                Selector::ByName(name.to_string())
            } else {
                Selector::ById(
                    ProjectId::new(group, name)
                        .map_err(|_| SelectorError::MissingName(raw.to_string()))?,
                )
            });
        }

        let path = base_dir.join(raw).clean();
        if path.is_file() {
            Ok(Selector::ByFile(path))
        } else if path.is_dir() {
            Ok(Selector::ByDir(path))
        } else {
            Err(SelectorError::NoSuchPath(raw.to_string(), path))
        }
    }

    pub fn matches(&self, descriptor: &Descriptor) -> bool {
        match self {
            Selector::ByName(name) => descriptor.name == *name,
            Selector::ById(id) => descriptor.project_id().as_ref() == Some(id),
            Selector::ByFile(file) => descriptor.source_path.as_deref() == Some(file.as_path()),
            Selector::ByDir(dir) => descriptor.base_dir() == Some(dir.as_path()),
        }
    }
}

/// Apply the user's selector strings to the source index.
///
/// Any unparseable selector aborts selection with a fatal problem.
pub fn select(
    index: &WorkspaceIndex,
    selectors: &[String],
    base_dir: &Path,
) -> Outcome<FxHashSet<ProjectId>> {
    let mut parsed = Vec::with_capacity(selectors.len());
    for raw in selectors {
        match Selector::parse(raw, base_dir) {
            Ok(selector) => parsed.push(selector),
            Err(err) => {
                return Outcome::error(vec![Problem::fatal(
                    err.to_string(),
                    base_dir.display().to_string(),
                )]);
            }
        }
    }

    let selected = index
        .iter()
        .filter(|(_, descriptor)| parsed.iter().any(|s| s.matches(descriptor)))
        .map(|(id, _)| id.clone())
        .collect();
    Outcome::success(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_model::DESCRIPTOR_FILE;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(group: &str, name: &str, path: Option<PathBuf>) -> Descriptor {
        let mut descriptor = Descriptor::named(name);
        descriptor.group = Some(group.into());
        descriptor.version = Some("1".into());
        descriptor.source_path = path;
        descriptor
    }

    fn index_of(descriptors: Vec<Descriptor>) -> WorkspaceIndex {
        WorkspaceIndex::build(descriptors).into_value().unwrap()
    }

    #[test]
    fn coordinate_selector_matches_exactly() {
        let base = TempDir::new().unwrap();
        let index = index_of(vec![
            descriptor("com.x", "app", None),
            descriptor("com.y", "app", None),
        ]);

        let selected = select(&index, &["com.x:app".to_string()], base.path())
            .into_value()
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert!(selected.contains(&ProjectId::new("com.x", "app").unwrap()));
    }

    #[test]
    fn name_selector_matches_any_group() {
        let base = TempDir::new().unwrap();
        let index = index_of(vec![
            descriptor("com.x", "app", None),
            descriptor("com.y", "app", None),
            descriptor("com.x", "lib", None),
        ]);

        let selected = select(&index, &[":app".to_string()], base.path())
            .into_value()
            .unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn path_selectors_match_file_and_directory() {
        let base = TempDir::new().unwrap();
        let project_dir = base.path().join("app");
        fs::create_dir_all(&project_dir).unwrap();
        let file = project_dir.join(DESCRIPTOR_FILE);
        fs::write(&file, "").unwrap();

        let index = index_of(vec![descriptor("com.x", "app", Some(file.clone()))]);

        let by_dir = select(&index, &["app".to_string()], base.path())
            .into_value()
            .unwrap();
        assert_eq!(by_dir.len(), 1);

        let by_file = select(
            &index,
            &[format!("app/{DESCRIPTOR_FILE}")],
            base.path(),
        )
        .into_value()
        .unwrap();
        assert_eq!(by_file.len(), 1);
    }

    #[test]
    fn invalid_selector_is_fatal() {
        let base = TempDir::new().unwrap();
        let index = index_of(vec![descriptor("com.x", "app", None)]);

        let result = select(&index, &["no/such/path".to_string()], base.path());
        assert!(result.has_errors());
        assert!(result.problems()[0].message.contains("invalid selector"));

        let result = select(&index, &["a:b:c".to_string()], base.path());
        assert!(result.has_errors());
    }
}
