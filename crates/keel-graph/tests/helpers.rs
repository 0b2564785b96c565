//! Shared fixtures for planner integration tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use keel_graph::model::reader::DescriptorSource;
use keel_graph::model::{
    Dependency, Descriptor, ExternalResolver, Unresolvable, DESCRIPTOR_FILE,
};

/// An on-disk workspace assembled from descriptor snippets.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    /// Write a descriptor at `rel` (a project directory relative to the
    /// workspace root; empty string means the root itself).
    pub fn write(&self, rel: &str, text: &str) -> PathBuf {
        let dir = if rel.is_empty() {
            self.dir.path().to_path_buf()
        } else {
            self.dir.path().join(rel)
        };
        fs::create_dir_all(&dir).expect("create project dir");
        let path = dir.join(DESCRIPTOR_FILE);
        fs::write(&path, text).expect("write descriptor");
        path
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join(DESCRIPTOR_FILE)
    }

    pub fn base_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

/// Binary descriptor fixture: previously built output of `group:name`.
pub fn binary_descriptor(
    group: &str,
    name: &str,
    version: &str,
    dependencies: &[(&str, &str, &str)],
) -> Descriptor {
    let mut descriptor = Descriptor::named(name);
    descriptor.group = Some(group.into());
    descriptor.version = Some(version.into());
    descriptor.dependencies = dependencies
        .iter()
        .map(|(group, name, version)| Dependency {
            version: Some(version.to_string()),
            ..Dependency::new(*group, *name)
        })
        .collect();
    descriptor
}

/// Resolver backed by an in-memory map of `group:name:version` to descriptor
/// text, standing in for a remote repository.
#[derive(Clone, Default)]
pub struct MapResolver {
    sources: BTreeMap<String, String>,
}

impl MapResolver {
    pub fn with(mut self, coordinates: &str, text: &str) -> Self {
        self.sources.insert(coordinates.to_string(), text.to_string());
        self
    }
}

impl ExternalResolver for MapResolver {
    fn resolve_model(
        &mut self,
        group: &str,
        name: &str,
        version: &str,
    ) -> Result<DescriptorSource, Unresolvable> {
        let key = format!("{group}:{name}:{version}");
        self.sources
            .get(&key)
            .map(|text| DescriptorSource::memory(format!("remote:{key}"), text.clone()))
            .ok_or_else(|| Unresolvable::new(group, name, version, "not in test repository"))
    }

    fn add_repository(&mut self, _repository: &keel_graph::model::Repository, _replace: bool) {}

    fn new_copy(&self) -> Box<dyn ExternalResolver> {
        Box::new(self.clone())
    }
}
