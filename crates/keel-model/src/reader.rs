//! Reading raw descriptors from files or memory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::descriptor::{Descriptor, DESCRIPTOR_FILE};
use crate::outcome::Outcome;
use crate::problem::Problem;
use crate::validation::{validate_raw, ValidationLevel};

/// Where a descriptor comes from.
///
/// The reader treats both variants uniformly; only the location hint in
/// diagnostics differs.
#[derive(Debug, Clone)]
pub enum DescriptorSource {
    File(PathBuf),
    Memory { location: String, text: String },
}

impl DescriptorSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn memory(location: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Memory {
            location: location.into(),
            text: text.into(),
        }
    }

    pub fn location(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory { location, .. } => location.clone(),
        }
    }

    fn read(&self) -> io::Result<String> {
        match self {
            Self::File(path) => fs::read_to_string(path),
            Self::Memory { text, .. } => Ok(text.clone()),
        }
    }
}

/// Locates the descriptor file within a module directory.
///
/// The loader delegates here whenever a module path fragment names a
/// directory instead of a file.
pub trait DescriptorLocator {
    fn locate(&self, dir: &Path) -> Option<PathBuf>;
}

/// Standard layout: every project directory carries a `keel.toml`.
pub struct StandardLocator;

impl DescriptorLocator for StandardLocator {
    fn locate(&self, dir: &Path) -> Option<PathBuf> {
        let candidate = dir.join(DESCRIPTOR_FILE);
        candidate.is_file().then_some(candidate)
    }
}

/// Parse a descriptor and validate its raw rules at the given level.
///
/// Unreadable or unparseable sources yield a fatal result with no value, as
/// do fatal raw-rule violations; rule violations below fatal keep the
/// descriptor available so callers can keep traversing.
///
/// With `location_tracking` the TOML parser's line/column rendering is kept
/// in the problem cause; without it only the bare message survives.
pub fn read_descriptor(
    source: &DescriptorSource,
    level: ValidationLevel,
    location_tracking: bool,
) -> Outcome<Descriptor> {
    let location = source.location();

    let text = match source.read() {
        Ok(text) => text,
        Err(err) => {
            return Outcome::error(vec![Problem::fatal(
                format!("non-readable descriptor {location}"),
                location.clone(),
            )
            .caused_by(err)]);
        }
    };

    let mut descriptor: Descriptor = match toml::from_str(&text) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            let cause = if location_tracking {
                err.to_string()
            } else {
                err.message().to_string()
            };
            return Outcome::error(vec![Problem::fatal(
                format!("non-parseable descriptor {location}"),
                location.clone(),
            )
            .caused_by(cause)]);
        }
    };

    if let DescriptorSource::File(path) = source {
        descriptor.source_path = Some(path.clone());
    }
    trace!(%location, name = %descriptor.name, "descriptor parsed");

    let mut problems = Vec::new();
    validate_raw(&descriptor, level, &mut problems);
    if problems
        .iter()
        .any(|p| p.severity == crate::problem::Severity::Fatal)
    {
        return Outcome::error(problems);
    }

    Outcome::of(Some(descriptor), problems)
}
