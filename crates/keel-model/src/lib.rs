//! # keel-model
//!
//! Descriptor model and per-descriptor pipeline primitives for the keel
//! reactor. This crate is pure data and transforms: it knows how to parse,
//! activate, assemble, interpolate, and validate a single descriptor, but
//! nothing about workspaces or build ordering — that lives in `keel-graph`.
//!
//! The stages compose in a fixed order per descriptor:
//!
//! ```text
//! read -> activate profiles -> assemble lineage -> interpolate -> enable
//! ```
//!
//! Every stage reports through [`Outcome`] instead of failing fast, so a
//! single run surfaces as many diagnostics as it can.

pub mod descriptor;
pub mod id;
pub mod inheritance;
pub mod interpolation;
pub mod management;
pub mod outcome;
pub mod problem;
pub mod profiles;
pub mod reader;
pub mod resolve;
pub mod superdesc;
pub mod validation;

pub use descriptor::{
    Activation, Dependency, DependencyKind, Descriptor, Execution, FileActivation, OsActivation,
    ParentRef, Plugin, Profile, PropertyActivation, Repository, Scope, DESCRIPTOR_FILE,
};
pub use id::{ProjectId, ProjectIdError};
pub use outcome::Outcome;
pub use problem::{Problem, Severity};
pub use profiles::{ActivatedDescriptor, ActivationContext, ProjectContext};
pub use reader::{read_descriptor, DescriptorLocator, DescriptorSource, StandardLocator};
pub use resolve::{CacheTag, DescriptorCache, ExternalResolver, NoRemoteResolver, Unresolvable};
pub use superdesc::{BuiltinSuperDescriptor, SuperDescriptorProvider};
pub use validation::ValidationLevel;
