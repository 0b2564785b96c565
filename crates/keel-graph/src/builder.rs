//! The project graph builder.
//!
//! Builds one node per coordinate by driving the per-descriptor pipeline and
//! recursing through every coordinate the pipeline references. Results are
//! memoized in insertion order, which makes the completed sequence a valid
//! topological order: a node is only inserted after everything it references
//! is either completed or external to the workspace.

use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use keel_model::descriptor::DESCRIPTOR_FILE;
use keel_model::management::LifecycleInjector;
use keel_model::profiles::{self, ActivatedDescriptor, ActivationContext};
use keel_model::reader::read_descriptor;
use keel_model::resolve::CacheTag;
use keel_model::superdesc::SuperDescriptorProvider;
use keel_model::{
    inheritance, interpolation, management, validation, Dependency, Descriptor, DescriptorCache,
    ExternalResolver, Outcome, ParentRef, Problem, Profile, ProjectId, ValidationLevel,
};

use crate::behavior::MakePolicy;
use crate::graph::{NodeId, ProjectGraph, ProjectNode};
use crate::index::WorkspaceIndex;

/// Internal abort signal.
///
/// Data problems travel in outcomes; `Halt` is reserved for conditions that
/// invalidate the whole traversal — a coordinate cycle, or a programming
/// error. It unwinds to [`GraphBuilder::run`], which converts it into a
/// fatal diagnostic so nothing ever escapes the public boundary as a panic.
#[derive(Debug)]
pub(crate) enum Halt {
    Cycle(Vec<ProjectId>),
    Assert(String),
}

impl Halt {
    fn into_problem(self) -> Problem {
        match self {
            Halt::Cycle(stack) => {
                let ids = stack
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Problem::fatal(format!("Project dependency cycle detected [{ids}]"), "")
            }
            Halt::Assert(message) => {
                Problem::fatal(format!("Assertion violation: {message}"), "")
            }
        }
    }
}

/// Immutable inputs of one graph-building invocation.
pub struct BuildRequest<'a> {
    pub policy: MakePolicy,
    pub source_index: &'a WorkspaceIndex,
    pub binary_index: Option<&'a WorkspaceIndex>,
    pub selected: &'a FxHashSet<ProjectId>,
    pub external_profiles: &'a [Profile],
    pub activation: ActivationContext,
    pub validation_level: ValidationLevel,
    pub super_provider: &'a dyn SuperDescriptorProvider,
    pub lifecycle: Option<&'a dyn LifecycleInjector>,
}

/// Mutable build state of one invocation; owned by a single call stack.
pub struct GraphBuilder<'a> {
    request: BuildRequest<'a>,
    resolver: Box<dyn ExternalResolver>,
    cache: DescriptorCache,
    nodes: Vec<ProjectNode>,
    /// Memoized result per coordinate, with `order` as its insertion
    /// journal. Together they are the insertion-ordered completed map.
    completed: FxHashMap<ProjectId, Outcome<NodeId>>,
    order: Vec<ProjectId>,
    /// Coordinates currently on the recursion stack, in recursion order.
    building: Vec<ProjectId>,
    /// Coordinates whose dependency-management is being imported.
    importing: Vec<ProjectId>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(request: BuildRequest<'a>, resolver: Box<dyn ExternalResolver>) -> Self {
        Self {
            request,
            resolver,
            cache: DescriptorCache::new(),
            nodes: Vec::new(),
            completed: FxHashMap::default(),
            order: Vec::new(),
            building: Vec::new(),
            importing: Vec::new(),
        }
    }

    /// Build every seed coordinate and assemble the final graph.
    pub fn run(mut self) -> Outcome<ProjectGraph> {
        let seeds = self
            .request
            .policy
            .seeds(self.request.source_index, self.request.selected);
        debug!(seeds = seeds.len(), policy = ?self.request.policy, "building project graph");

        for seed in &seeds {
            if let Err(halt) = self.build_by_id(seed) {
                return Outcome::error(vec![halt.into_problem()]);
            }
        }

        let mut problems = Vec::new();
        let mut failed = false;
        for id in &self.order {
            let outcome = &self.completed[id];
            failed = failed || outcome.has_errors();
            problems.extend(outcome.problems().to_vec());
        }
        if failed {
            return Outcome::error(problems);
        }

        let mut sorted = Vec::with_capacity(self.order.len());
        for id in &self.order {
            match self.completed[id].value() {
                Some(node) => sorted.push(*node),
                None => {
                    return Outcome::error(vec![
                        Halt::Assert(format!("completed project {id} has no node")).into_problem(),
                    ]);
                }
            }
        }
        Outcome::of(Some(ProjectGraph::new(self.nodes, sorted)), problems)
    }

    /// Build a coordinate, memoizing the result.
    ///
    /// Re-entering a coordinate that is still being built means the
    /// workspace coordinate graph has a cycle; rejecting it right here is
    /// what keeps the completed sequence a DAG — a finished node only ever
    /// points at nodes inserted before it.
    fn build_by_id(&mut self, id: &ProjectId) -> Result<Outcome<NodeId>, Halt> {
        if let Some(done) = self.completed.get(id) {
            return Ok(done.clone());
        }
        if self.building.contains(id) {
            return Err(Halt::Cycle(self.building.clone()));
        }

        self.building.push(id.clone());
        let result = self.build_for_policy(id);
        self.building.pop();
        let result = result?;

        self.completed.insert(id.clone(), result.clone());
        self.order.push(id.clone());
        Ok(result)
    }

    /// Variant dispatch for the invocation's policy.
    fn build_for_policy(&mut self, id: &ProjectId) -> Result<Outcome<NodeId>, Halt> {
        match self.request.policy {
            MakePolicy::All | MakePolicy::Upstream => {
                let raw = self.source_raw(id)?;
                self.build_variant(true, id, &raw)
            }
            MakePolicy::SelectedOnly => {
                if self.request.selected.contains(id) {
                    let raw = self.source_raw(id)?;
                    self.build_variant(true, id, &raw)
                } else {
                    let raw = self.binary_raw(id)?;
                    self.build_variant(false, id, &raw)
                }
            }
            MakePolicy::Downstream => self.build_downstream(id),
        }
    }

    /// The `DOWNSTREAM` decision procedure: build the source variant to
    /// inspect its closure, then fall back to the binary variant when it is
    /// independent of source projects.
    fn build_downstream(&mut self, id: &ProjectId) -> Result<Outcome<NodeId>, Halt> {
        let Some(source_raw) = self.request.source_index.get(id).cloned() else {
            // Reached through a binary closure; only the binary variant
            // exists for this coordinate.
            if self.request.selected.contains(id) {
                return Err(Halt::Assert(format!(
                    "selected set contains binary-only project {id}"
                )));
            }
            let raw = self.binary_raw(id)?;
            let binary = self.build_variant(false, id, &raw)?;
            if self.references_source(&binary) {
                let hint = raw.source_hint();
                return Ok(binary.with_problem(Problem::fatal(
                    format!(
                        "Binary project {id} refers to a source project, \
                         but no source project with same id available to use instead"
                    ),
                    hint,
                )));
            }
            return Ok(binary);
        };

        let source = self.build_variant(true, id, &source_raw)?;
        if self.request.selected.contains(id) {
            return Ok(source);
        }
        if self.references_source(&source) {
            trace!(%id, "stays source: depends on a source project");
            return Ok(source);
        }
        let Some(binary_raw) = self
            .request
            .binary_index
            .and_then(|index| index.get(id))
            .cloned()
        else {
            trace!(%id, "stays source: no binary variant available");
            return Ok(source);
        };
        let binary = self.build_variant(false, id, &binary_raw)?;
        if self.references_source(&binary) {
            // strategy: use source, because the binary would pull in source
            trace!(%id, "falls back to source: binary depends on a source project");
            Ok(source)
        } else {
            trace!(%id, "built from binary");
            Ok(binary)
        }
    }

    fn source_raw(&self, id: &ProjectId) -> Result<Descriptor, Halt> {
        self.request
            .source_index
            .get(id)
            .cloned()
            .ok_or_else(|| Halt::Assert(format!("build of non-existing project requested {id}")))
    }

    fn binary_raw(&self, id: &ProjectId) -> Result<Descriptor, Halt> {
        self.request
            .binary_index
            .and_then(|index| index.get(id))
            .cloned()
            .ok_or_else(|| Halt::Assert(format!("build of non-existing project requested {id}")))
    }

    fn references_source(&self, outcome: &Outcome<NodeId>) -> bool {
        outcome
            .value()
            .is_some_and(|node| self.nodes[node.index()].references_source)
    }

    fn is_project(&self, id: &ProjectId) -> bool {
        self.request
            .policy
            .is_project(id, self.request.source_index, self.request.binary_index)
    }

    /// Run the six-step pipeline for one descriptor variant and insert the
    /// resulting node into the arena.
    fn build_variant(
        &mut self,
        source: bool,
        id: &ProjectId,
        raw: &Descriptor,
    ) -> Result<Outcome<NodeId>, Halt> {
        trace!(%id, source, "building variant");
        let hint = raw.source_hint();
        let mut problems: Vec<Problem> = Vec::new();

        // 1. parent resolution: workspace parents become graph nodes;
        //    external parents are left to the lineage walk
        let parent_node = match raw.parent.as_ref().and_then(ParentRef::project_id) {
            Some(parent_id) if self.is_project(&parent_id) => {
                let parent = self.build_by_id(&parent_id)?;
                if parent.has_errors() {
                    problems.push(Problem::fatal(
                        format!("Failed to build parent project {parent_id}"),
                        hint,
                    ));
                    return Ok(Outcome::error(problems));
                }
                parent.into_value()
            }
            _ => None,
        };

        // 2. activation
        let activated = profiles::activate(
            raw,
            self.request.external_profiles,
            &self.request.activation,
            &mut problems,
        );

        // 3. lineage traversal, inheritance assembly, interpolation
        let mut resolver = self.resolver.new_copy();
        let Some(lineage) =
            self.collect_lineage(&activated, parent_node, resolver.as_mut(), &mut problems)
        else {
            return Ok(Outcome::error(problems));
        };

        let assembled = inheritance::assemble_lineage(&lineage);
        management::check_plugin_versions(&assembled, self.request.validation_level, &mut problems);

        let stack = interpolation::PropertyStack {
            system: &activated.context.external.system_properties,
            user: &activated.context.external.user_properties,
        };
        let interpolated = interpolation::interpolate(assembled, &stack);
        let failed = interpolated.has_errors();
        let (value, interpolation_problems) = interpolated.into_parts();
        problems.extend(interpolation_problems);
        let Some(mut descriptor) = value else {
            return Ok(Outcome::error(problems));
        };
        if failed {
            return Ok(Outcome::error(problems));
        }

        for repository in &descriptor.repositories {
            resolver.add_repository(repository, true);
        }

        // 4. dependency-management imports
        let imports = self.resolve_imports(&mut descriptor, id, resolver.as_ref(), &mut problems)?;
        if problems.iter().any(Problem::is_error) {
            return Ok(Outcome::error(problems));
        }

        // 5. enablement
        if let Some(lifecycle) = self.request.lifecycle {
            lifecycle.inject(&mut descriptor, &mut problems);
        }
        management::inject_plugin_management(&mut descriptor);
        management::inject_dependency_management(&mut descriptor);
        management::inject_defaults(&mut descriptor);
        management::expand_plugin_configuration(&mut descriptor);
        validation::validate_effective(&descriptor, self.request.validation_level, &mut problems);
        if problems.iter().any(Problem::is_error) {
            return Ok(Outcome::error(problems));
        }

        // 6. reference resolution over the effective descriptor
        let plugin_ids: Vec<ProjectId> = descriptor
            .plugins
            .iter()
            .filter_map(|p| p.project_id())
            .collect();
        let plugins = self.build_references(&plugin_ids, &mut problems)?;
        let dependency_ids: Vec<ProjectId> = descriptor
            .dependencies
            .iter()
            .filter_map(|d| d.project_id())
            .collect();
        let dependencies = self.build_references(&dependency_ids, &mut problems)?;
        if problems.iter().any(Problem::is_error) {
            return Ok(Outcome::error(problems));
        }

        let references_source = parent_node
            .into_iter()
            .chain(imports.iter().copied())
            .chain(plugins.iter().copied())
            .chain(dependencies.iter().copied())
            .any(|r| {
                let node = &self.nodes[r.index()];
                node.source || node.references_source
            });

        let node_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ProjectNode {
            id: id.clone(),
            descriptor,
            raw: raw.clone(),
            source,
            parent: parent_node,
            imports,
            plugins,
            dependencies,
            references_source,
        });
        Ok(Outcome::of(Some(node_id), problems))
    }

    /// Build every referenced workspace coordinate; non-workspace
    /// coordinates are external artifacts and resolve outside the graph.
    fn build_references(
        &mut self,
        ids: &[ProjectId],
        problems: &mut Vec<Problem>,
    ) -> Result<Vec<NodeId>, Halt> {
        let mut nodes = Vec::new();
        for id in ids {
            if !self.is_project(id) {
                continue;
            }
            let result = self.build_by_id(id)?;
            if result.has_errors() {
                problems.push(Problem::error(
                    format!("Failed to build referenced project {id}"),
                    "",
                ));
                continue;
            }
            if let Some(node) = result.into_value() {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Walk the parent chain of an activated descriptor.
    ///
    /// Returns the lineage child-first, each ancestor activated in the
    /// child's context, terminated by the super-descriptor. `None` means an
    /// external parent could not be resolved (problem already recorded).
    fn collect_lineage(
        &mut self,
        activated: &ActivatedDescriptor,
        parent_node: Option<NodeId>,
        resolver: &mut dyn ExternalResolver,
        problems: &mut Vec<Problem>,
    ) -> Option<Vec<Descriptor>> {
        let mut lineage = vec![activated.descriptor.clone()];
        let mut current_ref = activated.descriptor.parent.clone();
        let mut workspace_walk = parent_node;
        let child_base = activated.context.base_dir.clone();
        let mut seen: Vec<ProjectId> = activated.descriptor.project_id().into_iter().collect();

        while let Some(parent_ref) = current_ref {
            if let Some(parent_id) = parent_ref.project_id() {
                if seen.contains(&parent_id) {
                    let chain = seen
                        .iter()
                        .map(ToString::to_string)
                        .chain([parent_id.to_string()])
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    problems.push(Problem::fatal(
                        format!("The parent chain forms a cycle: {chain}"),
                        activated.descriptor.source_hint(),
                    ));
                    return None;
                }
                seen.push(parent_id);
            }

            let raw_parent = match workspace_walk {
                Some(node) => self.nodes[node.index()].raw.clone(),
                None => {
                    self.read_external_parent(&parent_ref, child_base.clone(), resolver, problems)?
                }
            };

            let (active_parent, _ids) =
                profiles::activate_parent(&raw_parent, &activated.context, problems);
            for repository in &active_parent.repositories {
                resolver.add_repository(repository, false);
            }

            current_ref = active_parent.parent.clone();
            lineage.push(active_parent);
            workspace_walk = workspace_walk.and_then(|node| self.nodes[node.index()].parent);
        }

        let super_descriptor = self.request.super_provider.super_descriptor();
        let (active_super, _ids) =
            profiles::activate_parent(&super_descriptor, &activated.context, problems);
        for repository in &active_super.repositories {
            resolver.add_repository(repository, false);
        }
        lineage.push(active_super);

        Some(lineage)
    }

    /// Resolve a parent that is not a workspace project.
    ///
    /// Cache hits are sanity-checked against the conventional parent
    /// location (the directory above the child): a cached descriptor read
    /// from a different file than the one sitting there is ignored, so the
    /// cache cannot mask a malformed workspace.
    fn read_external_parent(
        &mut self,
        parent_ref: &ParentRef,
        child_base: Option<PathBuf>,
        resolver: &mut dyn ExternalResolver,
        problems: &mut Vec<Problem>,
    ) -> Option<Descriptor> {
        let expected = child_base
            .as_deref()
            .and_then(|base| base.parent())
            .map(|dir| dir.join(DESCRIPTOR_FILE))
            .filter(|candidate| candidate.is_file());

        if let Some(hit) = self.cache.get(
            &parent_ref.group,
            &parent_ref.name,
            &parent_ref.version,
            CacheTag::Raw,
            expected.as_deref(),
        ) {
            return Some(hit.clone());
        }

        let source = match resolver.resolve_parent(parent_ref) {
            Ok(source) => source,
            Err(err) => {
                problems.push(
                    Problem::fatal(
                        format!(
                            "Non-resolvable parent descriptor {}:{}:{}",
                            parent_ref.group, parent_ref.name, parent_ref.version
                        ),
                        "",
                    )
                    .caused_by(err),
                );
                return None;
            }
        };

        // external parents are validated no stricter than the standard level
        let level = self.request.validation_level.min(ValidationLevel::Standard);
        let result = read_descriptor(&source, level, true);
        let (value, read_problems) = result.into_parts();
        problems.extend(read_problems);
        let descriptor = value?;

        self.cache.put(
            &parent_ref.group,
            &parent_ref.name,
            &parent_ref.version,
            CacheTag::Raw,
            descriptor.clone(),
        );
        Some(descriptor)
    }

    /// Resolve the descriptor's `pom`/`import` entries and merge the
    /// imported management sections in source order.
    ///
    /// Workspace imports become graph references; external imports run a
    /// reduced pipeline at minimal validation. An import that re-enters a
    /// coordinate already being imported is a cycle: reported and skipped.
    fn resolve_imports(
        &mut self,
        descriptor: &mut Descriptor,
        id: &ProjectId,
        resolver: &dyn ExternalResolver,
        problems: &mut Vec<Problem>,
    ) -> Result<Vec<NodeId>, Halt> {
        let imports: Vec<Dependency> = descriptor
            .managed_dependencies
            .iter()
            .filter(|d| d.is_import())
            .cloned()
            .collect();
        if imports.is_empty() {
            return Ok(Vec::new());
        }

        self.importing.push(id.clone());
        let result = self.resolve_imports_inner(descriptor, &imports, resolver, problems);
        self.importing.pop();
        result
    }

    fn resolve_imports_inner(
        &mut self,
        descriptor: &mut Descriptor,
        imports: &[Dependency],
        resolver: &dyn ExternalResolver,
        problems: &mut Vec<Problem>,
    ) -> Result<Vec<NodeId>, Halt> {
        let hint = descriptor.source_hint();
        let mut sections: Vec<Vec<Dependency>> = Vec::new();
        let mut nodes = Vec::new();

        for import in imports {
            let Some(import_id) = import.project_id() else {
                problems.push(Problem::error(
                    format!("import {}:{} has no valid coordinate", import.group, import.name),
                    hint.clone(),
                ));
                continue;
            };

            if self.importing.contains(&import_id) {
                let chain = self
                    .importing
                    .iter()
                    .map(ToString::to_string)
                    .chain([import_id.to_string()])
                    .collect::<Vec<_>>()
                    .join(" -> ");
                problems.push(Problem::error(
                    format!("Dependency-management imports form a cycle: {chain}"),
                    hint.clone(),
                ));
                continue;
            }

            if self.is_project(&import_id) {
                let result = self.build_by_id(&import_id)?;
                if result.has_errors() {
                    problems.push(Problem::error(
                        format!("Failed to build imported project {import_id}"),
                        hint.clone(),
                    ));
                    continue;
                }
                if let Some(node) = result.into_value() {
                    sections.push(self.nodes[node.index()].descriptor.managed_dependencies.clone());
                    nodes.push(node);
                }
            } else {
                let version = import.version.clone().unwrap_or_default();
                if let Some(section) =
                    self.build_external_import(&import_id, &version, resolver, problems)?
                {
                    sections.push(section);
                }
            }
        }

        management::import_management(descriptor, sections);
        Ok(nodes)
    }

    /// Build an external import descriptor far enough to know its effective
    /// dependency management: activate, assemble its (external) lineage,
    /// interpolate, then resolve its own imports.
    fn build_external_import(
        &mut self,
        id: &ProjectId,
        version: &str,
        resolver: &dyn ExternalResolver,
        problems: &mut Vec<Problem>,
    ) -> Result<Option<Vec<Dependency>>, Halt> {
        if let Some(hit) = self
            .cache
            .get(id.group(), id.name(), version, CacheTag::Import, None)
        {
            return Ok(Some(hit.managed_dependencies.clone()));
        }

        let mut import_resolver = resolver.new_copy();
        let source = match import_resolver.resolve_model(id.group(), id.name(), version) {
            Ok(source) => source,
            Err(err) => {
                problems.push(
                    Problem::error(
                        format!("Non-resolvable import descriptor {id}:{version}"),
                        "",
                    )
                    .caused_by(err),
                );
                return Ok(None);
            }
        };

        let result = read_descriptor(&source, ValidationLevel::Minimal, true);
        let (value, read_problems) = result.into_parts();
        problems.extend(read_problems);
        let Some(raw) = value else {
            return Ok(None);
        };

        let activated = profiles::activate(&raw, &[], &self.request.activation, problems);
        let Some(lineage) =
            self.collect_lineage(&activated, None, import_resolver.as_mut(), problems)
        else {
            return Ok(None);
        };
        let assembled = inheritance::assemble_lineage(&lineage);

        let stack = interpolation::PropertyStack {
            system: &self.request.activation.system_properties,
            user: &self.request.activation.user_properties,
        };
        let interpolated = interpolation::interpolate(assembled, &stack);
        let (value, interpolation_problems) = interpolated.into_parts();
        problems.extend(interpolation_problems);
        let Some(mut imported) = value else {
            return Ok(None);
        };

        let imported_id = id.clone();
        self.importing.push(imported_id);
        let nested = self.resolve_imports_nested(&mut imported, import_resolver.as_ref(), problems);
        self.importing.pop();
        nested?;

        self.cache.put(
            id.group(),
            id.name(),
            version,
            CacheTag::Import,
            imported.clone(),
        );
        Ok(Some(imported.managed_dependencies.clone()))
    }

    fn resolve_imports_nested(
        &mut self,
        descriptor: &mut Descriptor,
        resolver: &dyn ExternalResolver,
        problems: &mut Vec<Problem>,
    ) -> Result<(), Halt> {
        let imports: Vec<Dependency> = descriptor
            .managed_dependencies
            .iter()
            .filter(|d| d.is_import())
            .cloned()
            .collect();
        if imports.is_empty() {
            return Ok(());
        }
        self.resolve_imports_inner(descriptor, &imports, resolver, problems)?;
        Ok(())
    }
}
