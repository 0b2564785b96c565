//! Raw descriptor model.
//!
//! A [`Descriptor`] is the pure result of parsing a `keel.toml` file, before
//! any profile injection, inheritance assembly, or interpolation. The
//! pipeline never mutates a descriptor in place across stages; each stage
//! clones and transforms.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::id::ProjectId;

/// Name of the descriptor file a project directory is expected to carry.
pub const DESCRIPTOR_FILE: &str = "keel.toml";

/// A project descriptor as parsed from `keel.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Descriptor {
    /// Group the project belongs to; falls back to `parent.group`.
    #[serde(default)]
    pub group: Option<String>,

    /// Project name; together with the group it forms the coordinate.
    #[serde(default)]
    pub name: String,

    /// Version; falls back to `parent.version` during inheritance.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub parent: Option<ParentRef>,

    /// Aggregated child modules, as path fragments relative to this file.
    #[serde(default)]
    pub modules: Vec<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Dependency management: pinned versions and `pom`/`import` entries.
    #[serde(default)]
    pub managed_dependencies: Vec<Dependency>,

    #[serde(default)]
    pub plugins: Vec<Plugin>,

    /// Plugin management: versions and configuration applied to matching
    /// plugin declarations during enablement.
    #[serde(default)]
    pub managed_plugins: Vec<Plugin>,

    #[serde(default)]
    pub repositories: Vec<Repository>,

    #[serde(default)]
    pub profiles: Vec<Profile>,

    /// File this descriptor was read from; absent for synthetic descriptors
    /// (the super-descriptor, in-memory test fixtures).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Descriptor {
    /// Minimal descriptor with just a name, mostly for tests and the
    /// super-descriptor.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Coordinate of this descriptor, if derivable from raw content.
    pub fn project_id(&self) -> Option<ProjectId> {
        ProjectId::of_raw(self)
    }

    /// Version after the parent fallback, still uninterpolated.
    pub fn raw_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.version.as_str()))
    }

    /// Directory containing the descriptor file, when read from disk.
    pub fn base_dir(&self) -> Option<&Path> {
        self.source_path.as_deref().and_then(Path::parent)
    }

    /// Location hint used when attaching problems to this descriptor.
    pub fn source_hint(&self) -> String {
        match (&self.source_path, self.project_id()) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(id)) => id.to_string(),
            (None, None) => self.name.clone(),
        }
    }
}

/// Reference to the parent descriptor a project inherits from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl ParentRef {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        ProjectId::new(self.group.as_str(), self.name.as_str()).ok()
    }
}

/// What a dependency entry resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// A buildable artifact.
    #[default]
    Lib,
    /// A descriptor-only artifact, used by `import` scope.
    Pom,
}

/// Resolution scope of a dependency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Runtime,
    Test,
    Provided,
    /// Pulls the target's dependency management into this descriptor.
    Import,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub name: String,

    /// Absent versions are filled in from dependency management.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub kind: DependencyKind,

    #[serde(default)]
    pub scope: Scope,
}

impl Dependency {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: None,
            kind: DependencyKind::default(),
            scope: Scope::default(),
        }
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        ProjectId::new(self.group.as_str(), self.name.as_str()).ok()
    }

    /// Identity key for list merges.
    pub fn key(&self) -> (&str, &str) {
        (self.group.as_str(), self.name.as_str())
    }

    /// True for dependency-management entries that import another
    /// descriptor's management section.
    pub fn is_import(&self) -> bool {
        self.kind == DependencyKind::Pom && self.scope == Scope::Import
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub config: BTreeMap<String, String>,

    #[serde(default)]
    pub executions: Vec<Execution>,
}

impl Plugin {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: None,
            config: BTreeMap::new(),
            executions: Vec::new(),
        }
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        ProjectId::new(self.group.as_str(), self.name.as_str()).ok()
    }

    pub fn key(&self) -> (&str, &str) {
        (self.group.as_str(), self.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    #[serde(default = "Execution::default_id")]
    pub id: String,

    #[serde(default)]
    pub goals: Vec<String>,

    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl Execution {
    fn default_id() -> String {
        "default".to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// A conditionally applied descriptor overlay.
///
/// Note the overlay deliberately has no `modules` field in its effective
/// shape: the module set is fixed by raw descriptors, and a profile that
/// declares modules is rejected by raw validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub activation: Option<Activation>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default)]
    pub managed_dependencies: Vec<Dependency>,

    #[serde(default)]
    pub plugins: Vec<Plugin>,

    #[serde(default)]
    pub repositories: Vec<Repository>,

    /// Parsed only so raw validation can reject it with a useful message.
    #[serde(default)]
    pub modules: Vec<String>,
}

/// Activation predicate of a profile.
///
/// All present conditions must hold; a profile with no activation section is
/// only activated by explicit id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activation {
    /// Active when no sibling profile was activated by any other means.
    #[serde(default)]
    pub active_by_default: bool,

    #[serde(default)]
    pub property: Option<PropertyActivation>,

    #[serde(default)]
    pub file: Option<FileActivation>,

    /// Prefix match against the `java.version` system property; a leading
    /// `!` negates.
    #[serde(default)]
    pub jdk: Option<String>,

    #[serde(default)]
    pub os: Option<OsActivation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyActivation {
    /// Property name; a leading `!` activates on absence instead.
    pub name: String,

    /// Expected value; `None` means mere presence. A leading `!` negates.
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileActivation {
    /// Path (relative to the descriptor's directory) that must exist.
    #[serde(default)]
    pub exists: Option<String>,

    /// Path that must be absent.
    #[serde(default)]
    pub missing: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsActivation {
    #[serde(default)]
    pub name: Option<String>,

    /// `unix` or `windows`.
    #[serde(default)]
    pub family: Option<String>,

    #[serde(default)]
    pub arch: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let text = r#"
group = "com.x"
name = "app"
version = "1.0"
modules = ["lib"]

[parent]
group = "com.x"
name = "parent"
version = "1.0"

[properties]
rev = "1.0"

[[dependencies]]
group = "com.x"
name = "lib"

[[managed_dependencies]]
group = "x"
name = "y"
version = "1.0"
kind = "pom"
scope = "import"

[[plugins]]
group = "org.keel"
name = "compiler"
version = "2.1"
[plugins.config]
release = "17"
[[plugins.executions]]
goals = ["compile"]

[[repositories]]
id = "central"
url = "https://repo.example/releases"

[[profiles]]
id = "ci"
[profiles.activation]
property = { name = "env", value = "ci" }
"#;

        let descriptor: Descriptor = toml::from_str(text).unwrap();
        assert_eq!(descriptor.project_id().unwrap().to_string(), "com.x:app");
        assert_eq!(descriptor.modules, vec!["lib"]);
        assert!(descriptor.managed_dependencies[0].is_import());
        assert_eq!(descriptor.plugins[0].executions[0].id, "default");
        assert_eq!(descriptor.profiles[0].id, "ci");
    }

    #[test]
    fn version_falls_back_to_parent() {
        let mut descriptor = Descriptor::named("app");
        descriptor.parent = Some(ParentRef::new("com.x", "parent", "2.0"));
        assert_eq!(descriptor.raw_version(), Some("2.0"));

        descriptor.version = Some("3.0".into());
        assert_eq!(descriptor.raw_version(), Some("3.0"));
    }

    #[test]
    fn defaults_for_dependency_fields() {
        let dependency: Dependency = toml::from_str(
            r#"
group = "x"
name = "y"
"#,
        )
        .unwrap();
        assert_eq!(dependency.kind, DependencyKind::Lib);
        assert_eq!(dependency.scope, Scope::Compile);
        assert!(!dependency.is_import());
    }
}
