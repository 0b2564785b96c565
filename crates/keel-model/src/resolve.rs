//! External descriptor resolution.
//!
//! Descriptors that are not part of the workspace (external parents, imports)
//! are fetched through the [`ExternalResolver`] interface and cached for the
//! duration of one invocation.

use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::descriptor::{Descriptor, ParentRef, Repository};
use crate::reader::DescriptorSource;

/// Raised when the resolver cannot produce a source for a coordinate.
#[derive(Debug, Error)]
#[error("could not resolve descriptor {group}:{name}:{version}: {reason}")]
pub struct Unresolvable {
    pub group: String,
    pub name: String,
    pub version: String,
    pub reason: String,
}

impl Unresolvable {
    pub fn new(group: &str, name: &str, version: &str, reason: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            reason: reason.into(),
        }
    }
}

/// Fetches descriptors that live outside the workspace.
///
/// Repositories declared by descriptors are pushed into the resolver as the
/// lineage is walked, widening where later resolutions may look.
pub trait ExternalResolver {
    fn resolve_model(
        &mut self,
        group: &str,
        name: &str,
        version: &str,
    ) -> Result<DescriptorSource, Unresolvable>;

    fn resolve_parent(&mut self, parent: &ParentRef) -> Result<DescriptorSource, Unresolvable> {
        self.resolve_model(&parent.group, &parent.name, &parent.version)
    }

    fn add_repository(&mut self, repository: &Repository, replace: bool);

    /// Independent copy with the same repository state, handed to nested
    /// import builds so they cannot pollute the caller's repositories.
    fn new_copy(&self) -> Box<dyn ExternalResolver>;
}

/// Resolver for workspaces without remote access: every lookup fails.
pub struct NoRemoteResolver;

impl ExternalResolver for NoRemoteResolver {
    fn resolve_model(
        &mut self,
        group: &str,
        name: &str,
        version: &str,
    ) -> Result<DescriptorSource, Unresolvable> {
        Err(Unresolvable::new(
            group,
            name,
            version,
            "no remote repositories configured",
        ))
    }

    fn add_repository(&mut self, _repository: &Repository, _replace: bool) {}

    fn new_copy(&self) -> Box<dyn ExternalResolver> {
        Box::new(NoRemoteResolver)
    }
}

/// What a cached descriptor was resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Raw descriptor resolved as somebody's parent.
    Raw,
    /// Effective management section source resolved as an import.
    Import,
}

/// Per-invocation cache of externally resolved descriptors.
///
/// Write-once per key: the first descriptor stored for a coordinate wins and
/// later stores are ignored.
#[derive(Default)]
pub struct DescriptorCache {
    entries: FxHashMap<(String, String, String, CacheTag), Descriptor>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache lookup with the sanity check applied.
    ///
    /// When the caller knows which file the descriptor would be expected at
    /// (`expected_source`), a cached descriptor read from a different file is
    /// treated as a miss so the cache never masks a malformed workspace; the
    /// caller then re-resolves externally.
    pub fn get(
        &self,
        group: &str,
        name: &str,
        version: &str,
        tag: CacheTag,
        expected_source: Option<&Path>,
    ) -> Option<&Descriptor> {
        let cached = self.entries.get(&(
            group.to_string(),
            name.to_string(),
            version.to_string(),
            tag,
        ))?;
        if let (Some(cached_path), Some(expected)) = (&cached.source_path, expected_source) {
            if cached_path != expected {
                return None;
            }
        }
        Some(cached)
    }

    pub fn put(
        &mut self,
        group: &str,
        name: &str,
        version: &str,
        tag: CacheTag,
        descriptor: Descriptor,
    ) {
        self.entries
            .entry((
                group.to_string(),
                name.to_string(),
                version.to_string(),
                tag,
            ))
            .or_insert(descriptor);
    }
}
