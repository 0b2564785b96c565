//! # keel-graph
//!
//! Workspace discovery and project graph construction for the keel reactor.
//!
//! Given the root descriptor of a multi-module workspace, this crate
//! discovers every descriptor reachable through module aggregation, applies
//! the user's project selection and build behavior, and builds a directed
//! acyclic graph of fully effective descriptors in topological order:
//!
//! ```text
//! load modules -> index by coordinate -> select -> policy -> build graph
//! ```
//!
//! The per-descriptor pipeline (profile activation, inheritance assembly,
//! interpolation, enablement) comes from `keel-model`; this crate drives it
//! recursively across the workspace, memoizing one node per coordinate and
//! rejecting coordinate cycles where they close.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use keel_graph::Session;
//!
//! let result = Session::new("workspace/keel.toml").plan();
//! if let Some(graph) = result.value() {
//!     for project in graph.sorted_projects() {
//!         println!("{}", project.id);
//!     }
//! }
//! ```
//!
//! The planner never panics on malformed input: every result is an
//! [`Outcome`](keel_model::Outcome) carrying the diagnostics produced along
//! the way, in order.

pub mod behavior;
mod builder;
pub mod graph;
pub mod index;
pub mod loader;
pub mod select;
pub mod session;

#[cfg(feature = "logging")]
pub mod logging;

pub use behavior::{create_policy, MakeMode, MakePolicy};
pub use graph::{NodeId, ProjectGraph, ProjectNode};
pub use index::WorkspaceIndex;
pub use loader::load_workspace;
pub use select::{select, Selector, SelectorError};
pub use session::{BinaryStore, InMemoryBinaryStore, Session};

// the model crate is half of the public surface; re-export it whole
pub use keel_model as model;
