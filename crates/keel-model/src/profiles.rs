//! Profile activation and injection.
//!
//! Activation happens in a context derived from the *project being built*:
//! explicit ids and property overrides from the session, plus the
//! descriptor's base directory and properties. Parents are activated in the
//! child's context too, augmented only with the parent's own properties.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use tracing::trace;

use crate::descriptor::{Activation, Descriptor, Profile};
use crate::management::merge_duplicates;
use crate::problem::Problem;

/// Session-level activation inputs shared by every project of an invocation.
#[derive(Debug, Clone, Default)]
pub struct ActivationContext {
    pub active_ids: Vec<String>,
    pub inactive_ids: Vec<String>,
    pub system_properties: BTreeMap<String, String>,
    pub user_properties: BTreeMap<String, String>,
}

impl ActivationContext {
    /// Fold the properties of active external profiles into the user
    /// properties. Explicit user properties win over profile properties.
    pub fn with_profile_properties(&self, profiles: &[Profile]) -> Self {
        let mut user_properties = BTreeMap::new();
        for profile in profiles {
            user_properties.extend(profile.properties.clone());
        }
        user_properties.extend(self.user_properties.clone());
        Self {
            active_ids: self.active_ids.clone(),
            inactive_ids: self.inactive_ids.clone(),
            system_properties: self.system_properties.clone(),
            user_properties,
        }
    }

    /// Context for activating profiles of the given descriptor.
    pub fn for_descriptor(&self, descriptor: &Descriptor) -> ProjectContext {
        ProjectContext {
            external: self.clone(),
            base_dir: descriptor.base_dir().map(PathBuf::from),
            properties: descriptor.properties.clone(),
        }
    }
}

/// Activation context of one project: the session inputs plus the project's
/// base directory and descriptor properties.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub external: ActivationContext,
    pub base_dir: Option<PathBuf>,
    pub properties: BTreeMap<String, String>,
}

impl ProjectContext {
    /// Property lookup across the stack: user, then system, then descriptor.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.external
            .user_properties
            .get(name)
            .or_else(|| self.external.system_properties.get(name))
            .or_else(|| self.properties.get(name))
            .map(String::as_str)
    }

    /// Same context with additional descriptor properties layered in.
    ///
    /// Used when activating a parent: the child's base directory and
    /// session inputs stay, the parent contributes its own properties.
    pub fn with_properties(&self, extra: &BTreeMap<String, String>) -> Self {
        let mut properties = self.properties.clone();
        for (key, value) in extra {
            properties.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Self {
            external: self.external.clone(),
            base_dir: self.base_dir.clone(),
            properties,
        }
    }
}

/// A descriptor after profile injection, with the activation bookkeeping the
/// rest of the pipeline needs.
#[derive(Debug, Clone)]
pub struct ActivatedDescriptor {
    pub descriptor: Descriptor,
    pub active_local_profiles: Vec<String>,
    pub active_external_profiles: Vec<Profile>,
    pub context: ProjectContext,
}

/// Activate a project descriptor.
///
/// External profiles (contributed by the session) are selected first; their
/// properties then take part in selecting the descriptor's own profiles.
/// Overlays are injected descriptor profiles first, external profiles after.
pub fn activate(
    raw: &Descriptor,
    external_profiles: &[Profile],
    external: &ActivationContext,
    problems: &mut Vec<Problem>,
) -> ActivatedDescriptor {
    let bootstrap = external.for_descriptor(raw);
    let active_external = select_active(external_profiles, &bootstrap);

    let context = external
        .with_profile_properties(&active_external)
        .for_descriptor(raw);

    let mut descriptor = raw.clone();
    merge_duplicates(&mut descriptor, problems);

    let active_local = select_active(&raw.profiles, &context);
    for profile in &active_local {
        inject_profile(&mut descriptor, profile);
    }
    for profile in &active_external {
        inject_profile(&mut descriptor, profile);
    }

    let active_local_profiles: Vec<String> = active_local.iter().map(|p| p.id.clone()).collect();
    if !active_local_profiles.is_empty() || !active_external.is_empty() {
        trace!(
            descriptor = %raw.name,
            local = ?active_local_profiles,
            external = active_external.len(),
            "profiles activated"
        );
    }

    ActivatedDescriptor {
        descriptor,
        active_local_profiles,
        active_external_profiles: active_external,
        context,
    }
}

/// Activate a parent descriptor in the child's context.
///
/// Only the parent's own profiles apply; external profiles were already
/// injected into the child and are not repeated up the lineage.
pub fn activate_parent(
    raw_parent: &Descriptor,
    child_context: &ProjectContext,
    problems: &mut Vec<Problem>,
) -> (Descriptor, Vec<String>) {
    let context = child_context.with_properties(&raw_parent.properties);

    let mut descriptor = raw_parent.clone();
    merge_duplicates(&mut descriptor, problems);

    let active = select_active(&raw_parent.profiles, &context);
    for profile in &active {
        inject_profile(&mut descriptor, profile);
    }

    let ids = active.iter().map(|p| p.id.clone()).collect();
    (descriptor, ids)
}

/// Determine the active subset of a profile collection.
///
/// Explicitly deactivated ids never activate. Otherwise a profile activates
/// through an explicit id or through its predicate; if nothing activated,
/// `active_by_default` profiles fill in. The result is ordered by profile id
/// so activation is deterministic regardless of declaration order.
pub fn select_active(profiles: &[Profile], context: &ProjectContext) -> Vec<Profile> {
    let mut active: Vec<Profile> = profiles
        .iter()
        .filter(|p| !is_deactivated(p, context))
        .filter(|p| is_explicitly_active(p, context) || predicate_holds(p, context))
        .cloned()
        .collect();

    if active.is_empty() {
        active = profiles
            .iter()
            .filter(|p| !is_deactivated(p, context))
            .filter(|p| {
                p.activation
                    .as_ref()
                    .is_some_and(|activation| activation.active_by_default)
            })
            .cloned()
            .collect();
    }

    active.sort_by(|a, b| a.id.cmp(&b.id));
    active
}

fn is_deactivated(profile: &Profile, context: &ProjectContext) -> bool {
    context.external.inactive_ids.iter().any(|id| *id == profile.id)
}

fn is_explicitly_active(profile: &Profile, context: &ProjectContext) -> bool {
    context.external.active_ids.iter().any(|id| *id == profile.id)
}

fn predicate_holds(profile: &Profile, context: &ProjectContext) -> bool {
    let Some(activation) = &profile.activation else {
        return false;
    };
    let Activation {
        active_by_default: _,
        property,
        file,
        jdk,
        os,
    } = activation;

    if property.is_none() && file.is_none() && jdk.is_none() && os.is_none() {
        return false;
    }

    if let Some(condition) = property {
        let holds = match condition.name.strip_prefix('!') {
            Some(name) => context.property(name).is_none(),
            None => {
                let actual = context.property(&condition.name);
                match &condition.value {
                    None => actual.is_some(),
                    Some(expected) => match expected.strip_prefix('!') {
                        Some(negated) => actual != Some(negated),
                        None => actual == Some(expected.as_str()),
                    },
                }
            }
        };
        if !holds {
            return false;
        }
    }

    if let Some(condition) = file {
        let resolve = |fragment: &str| match &context.base_dir {
            Some(base) => base.join(fragment),
            None => PathBuf::from(fragment),
        };
        if let Some(path) = &condition.exists {
            if !resolve(path).exists() {
                return false;
            }
        }
        if let Some(path) = &condition.missing {
            if resolve(path).exists() {
                return false;
            }
        }
    }

    if let Some(expected) = jdk {
        let version = context.property("java.version").unwrap_or_default().to_string();
        let holds = match expected.strip_prefix('!') {
            Some(negated) => !version.starts_with(negated),
            None => version.starts_with(expected.as_str()),
        };
        if !holds {
            return false;
        }
    }

    if let Some(condition) = os {
        let name = context
            .property("os.name")
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| env::consts::OS.to_string());
        let family = context
            .property("os.family")
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| env::consts::FAMILY.to_string());
        let arch = context
            .property("os.arch")
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| env::consts::ARCH.to_string());

        for (expected, actual) in [
            (&condition.name, name),
            (&condition.family, family),
            (&condition.arch, arch),
        ] {
            if let Some(expected) = expected {
                if !expected.eq_ignore_ascii_case(&actual) {
                    return false;
                }
            }
        }
    }

    true
}

/// Merge an active profile's overlay into the descriptor.
///
/// Profile properties win over descriptor properties; list sections merge by
/// identity key with the profile entry overriding the existing one.
pub fn inject_profile(descriptor: &mut Descriptor, profile: &Profile) {
    for (key, value) in &profile.properties {
        descriptor.properties.insert(key.clone(), value.clone());
    }

    for dependency in &profile.dependencies {
        match descriptor
            .dependencies
            .iter_mut()
            .find(|d| d.key() == dependency.key())
        {
            Some(existing) => *existing = dependency.clone(),
            None => descriptor.dependencies.push(dependency.clone()),
        }
    }

    for dependency in &profile.managed_dependencies {
        match descriptor
            .managed_dependencies
            .iter_mut()
            .find(|d| d.key() == dependency.key())
        {
            Some(existing) => *existing = dependency.clone(),
            None => descriptor.managed_dependencies.push(dependency.clone()),
        }
    }

    for plugin in &profile.plugins {
        match descriptor
            .plugins
            .iter_mut()
            .find(|p| p.key() == plugin.key())
        {
            Some(existing) => *existing = plugin.clone(),
            None => descriptor.plugins.push(plugin.clone()),
        }
    }

    for repository in &profile.repositories {
        match descriptor
            .repositories
            .iter_mut()
            .find(|r| r.id == repository.id)
        {
            Some(existing) => *existing = repository.clone(),
            None => descriptor.repositories.push(repository.clone()),
        }
    }
}
