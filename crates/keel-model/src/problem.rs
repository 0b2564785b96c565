//! Diagnostics carried by pipeline results.
//!
//! Every stage of the pipeline reports through [`Problem`] values rather than
//! failing fast; whether a collection of problems constitutes an error is
//! decided by severity alone.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a single diagnostic.
///
/// `Fatal` and `Error` put the surrounding result into an error state;
/// `Warning` and `Info` are advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Info,
}

impl Severity {
    /// True for severities that mark a result as failed.
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Fatal | Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{text}")
    }
}

/// A single diagnostic: severity, message, and where it came from.
///
/// `source` is a human-oriented location hint, typically the descriptor file
/// path or a `group:name` coordinate. `cause` carries the rendered underlying
/// error when one exists (an IO error, a parse error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    pub message: String,
    pub source: String,
    pub cause: Option<String>,
}

impl Problem {
    pub fn new(severity: Severity, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            source: source.into(),
            cause: None,
        }
    }

    pub fn fatal(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message, source)
    }

    pub fn error(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(Severity::Error, message, source)
    }

    pub fn warning(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message, source)
    }

    /// Attach the rendered underlying error.
    pub fn caused_by(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "[{}] {}", self.severity, self.message)?;
        } else {
            write!(f, "[{}] {} @ {}", self.severity, self.message, self.source)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}
