use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::descriptor::Descriptor;

/// Version-less identifier of a project in the workspace.
///
/// Two descriptors denote the same project iff their identifiers compare
/// equal componentwise. The textual form is `group:name`, which is also how
/// the identifier appears in diagnostics and selectors.
///
/// An identifier must be derivable from a raw descriptor without inheritance
/// assembly or interpolation; [`ProjectId::of_raw`] applies the only
/// permitted fallback (a missing `group` is taken from the declared parent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId {
    group: String,
    name: String,
}

impl ProjectId {
    /// Create an identifier from its two components.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Result<Self, ProjectIdError> {
        let group = group.into();
        let name = name.into();
        if group.is_empty() {
            return Err(ProjectIdError::EmptyGroup);
        }
        if name.is_empty() {
            return Err(ProjectIdError::EmptyName);
        }
        Ok(Self { group, name })
    }

    /// Derive the identifier of a raw descriptor.
    ///
    /// Returns `None` when neither the descriptor nor its parent reference
    /// carries a group; raw validation reports that case as fatal.
    pub fn of_raw(descriptor: &Descriptor) -> Option<Self> {
        let group = descriptor
            .group
            .as_deref()
            .or_else(|| descriptor.parent.as_ref().map(|p| p.group.as_str()))?;
        Self::new(group, descriptor.name.as_str()).ok()
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

impl Serialize for ProjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}:{}", self.group, self.name))
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let (group, name) = text
            .split_once(':')
            .ok_or_else(|| serde::de::Error::custom("project id must be `group:name`"))?;
        ProjectId::new(group, name).map_err(serde::de::Error::custom)
    }
}

/// Error type for [`ProjectId`] construction failures.
#[derive(Debug, Error)]
pub enum ProjectIdError {
    #[error("project group is empty")]
    EmptyGroup,

    #[error("project name is empty")]
    EmptyName,
}
