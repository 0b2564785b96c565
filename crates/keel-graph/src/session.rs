//! The planning session: inputs, collaborators, and the entry point.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info};

use keel_model::management::LifecycleInjector;
use keel_model::profiles::ActivationContext;
use keel_model::reader::DescriptorLocator;
use keel_model::superdesc::SuperDescriptorProvider;
use keel_model::{
    BuiltinSuperDescriptor, Descriptor, ExternalResolver, NoRemoteResolver, Outcome, Problem,
    Profile, StandardLocator, ValidationLevel,
};

use crate::behavior::{create_policy, MakeMode};
use crate::builder::{BuildRequest, GraphBuilder};
use crate::graph::ProjectGraph;
use crate::index::WorkspaceIndex;
use crate::loader::load_workspace;
use crate::select::select;

/// Source of previously built (binary) descriptors.
///
/// Modes that satisfy references from prior build output read the binary
/// index from here; a session without a store can only run `All` and
/// `Upstream` behaviors.
pub trait BinaryStore {
    fn load(&self) -> Outcome<Vec<Descriptor>>;
}

/// Binary descriptors held in memory, typically assembled by a previous
/// invocation or a test.
pub struct InMemoryBinaryStore(pub Vec<Descriptor>);

impl BinaryStore for InMemoryBinaryStore {
    fn load(&self) -> Outcome<Vec<Descriptor>> {
        Outcome::success(self.0.clone())
    }
}

/// Everything one planning invocation needs: the root descriptor, the user's
/// selection, activation inputs, and the collaborator implementations.
pub struct Session {
    root_descriptor: PathBuf,
    base_directory: PathBuf,
    selected_projects: Vec<String>,
    make_mode: Option<MakeMode>,
    active_profile_ids: Vec<String>,
    inactive_profile_ids: Vec<String>,
    system_properties: BTreeMap<String, String>,
    user_properties: BTreeMap<String, String>,
    validation_level: ValidationLevel,
    profiles: Vec<Profile>,
    locator: Box<dyn DescriptorLocator>,
    resolver: Box<dyn ExternalResolver>,
    super_provider: Box<dyn SuperDescriptorProvider>,
    lifecycle: Option<Box<dyn LifecycleInjector>>,
    binary_store: Option<Box<dyn BinaryStore>>,
}

impl Session {
    /// Session with defaults: no selection, no remote access, the standard
    /// locator and super-descriptor. The base directory defaults to the
    /// root descriptor's directory.
    pub fn new(root_descriptor: impl Into<PathBuf>) -> Self {
        let root_descriptor = root_descriptor.into();
        let base_directory = root_descriptor
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            root_descriptor,
            base_directory,
            selected_projects: Vec::new(),
            make_mode: None,
            active_profile_ids: Vec::new(),
            inactive_profile_ids: Vec::new(),
            system_properties: BTreeMap::new(),
            user_properties: BTreeMap::new(),
            validation_level: ValidationLevel::default(),
            profiles: Vec::new(),
            locator: Box::new(StandardLocator),
            resolver: Box::new(NoRemoteResolver),
            super_provider: Box::new(BuiltinSuperDescriptor),
            lifecycle: None,
            binary_store: None,
        }
    }

    pub fn base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_directory = dir.into();
        self
    }

    /// Selector strings (`--projects`); empty means build everything.
    pub fn selected_projects(mut self, selectors: Vec<String>) -> Self {
        self.selected_projects = selectors;
        self
    }

    pub fn make_mode(mut self, mode: Option<MakeMode>) -> Self {
        self.make_mode = mode;
        self
    }

    pub fn active_profiles(mut self, ids: Vec<String>) -> Self {
        self.active_profile_ids = ids;
        self
    }

    pub fn inactive_profiles(mut self, ids: Vec<String>) -> Self {
        self.inactive_profile_ids = ids;
        self
    }

    pub fn system_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.system_properties = properties;
        self
    }

    pub fn user_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.user_properties = properties;
        self
    }

    pub fn validation_level(mut self, level: ValidationLevel) -> Self {
        self.validation_level = level;
        self
    }

    /// Externally contributed profile definitions.
    pub fn profiles(mut self, profiles: Vec<Profile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn locator(mut self, locator: Box<dyn DescriptorLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn resolver(mut self, resolver: Box<dyn ExternalResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn super_provider(mut self, provider: Box<dyn SuperDescriptorProvider>) -> Self {
        self.super_provider = provider;
        self
    }

    pub fn lifecycle(mut self, injector: Box<dyn LifecycleInjector>) -> Self {
        self.lifecycle = Some(injector);
        self
    }

    pub fn binary_store(mut self, store: Box<dyn BinaryStore>) -> Self {
        self.binary_store = Some(store);
        self
    }

    /// Run the planner: load the workspace, index it, apply the selection
    /// and build behavior, and build the topologically sorted project graph.
    pub fn plan(&self) -> Outcome<ProjectGraph> {
        info!(root = %self.root_descriptor.display(), "planning project graph");

        let loaded = load_workspace(&self.root_descriptor, self.locator.as_ref());
        if loaded.has_errors() {
            return Outcome::error(loaded.into_parts().1);
        }
        let (descriptors, mut problems) = loaded.into_parts();

        let indexed = WorkspaceIndex::build(descriptors.unwrap_or_default());
        let Some(source_index) = finish_stage(indexed, &mut problems) else {
            return Outcome::error(problems);
        };
        debug!(projects = source_index.len(), "workspace indexed");

        let selection = select(&source_index, &self.selected_projects, &self.base_directory);
        let Some(selected) = finish_stage(selection, &mut problems) else {
            return Outcome::error(problems);
        };

        let binary_index = match &self.binary_store {
            Some(store) => {
                let loaded = store.load();
                let Some(binaries) = finish_stage(loaded, &mut problems) else {
                    return Outcome::error(problems);
                };
                let indexed = WorkspaceIndex::build(binaries);
                let Some(index) = finish_stage(indexed, &mut problems) else {
                    return Outcome::error(problems);
                };
                Some(index)
            }
            None => None,
        };

        let policy_result = create_policy(&selected, self.make_mode, binary_index.is_some());
        let Some(policy) = finish_stage(policy_result, &mut problems) else {
            return Outcome::error(problems);
        };

        let request = BuildRequest {
            policy,
            source_index: &source_index,
            binary_index: binary_index.as_ref(),
            selected: &selected,
            external_profiles: &self.profiles,
            activation: ActivationContext {
                active_ids: self.active_profile_ids.clone(),
                inactive_ids: self.inactive_profile_ids.clone(),
                system_properties: self.system_properties.clone(),
                user_properties: self.user_properties.clone(),
            },
            validation_level: self.validation_level,
            super_provider: self.super_provider.as_ref(),
            lifecycle: self.lifecycle.as_deref(),
        };

        let built = GraphBuilder::new(request, self.resolver.new_copy()).run();
        let (graph, build_problems) = built.into_parts();
        problems.extend(build_problems);
        Outcome::of(graph, problems)
    }
}

/// Absorb a stage result: diagnostics always carry over, the value only
/// when the stage did not fail.
fn finish_stage<T>(result: Outcome<T>, problems: &mut Vec<Problem>) -> Option<T> {
    let failed = result.has_errors();
    let (value, stage_problems) = result.into_parts();
    problems.extend(stage_problems);
    if failed {
        None
    } else {
        value
    }
}
