//! Uniform result carrier for pipeline stages.
//!
//! A stage never fails by returning a Rust error; it returns an [`Outcome`]
//! that pairs an optional value with the ordered diagnostics produced along
//! the way. The error state is sticky: once a result carries an error-level
//! problem it stays failed, no matter how many values are attached later.

use crate::problem::Problem;

/// A value together with the ordered diagnostics produced while computing it.
///
/// Four shapes occur in practice: success without problems, success with
/// warnings, error without a value, and error with a partial value kept so
/// downstream stages can still report against it.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    value: Option<T>,
    problems: Vec<Problem>,
    failed: bool,
}

impl<T> Outcome<T> {
    /// Success without diagnostics.
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            problems: Vec::new(),
            failed: false,
        }
    }

    /// Success with advisory diagnostics.
    ///
    /// The caller asserts none of the problems are error-level; use
    /// [`Outcome::of`] when that is not statically known.
    pub fn success_with(value: T, problems: Vec<Problem>) -> Self {
        debug_assert!(problems.iter().all(|p| !p.is_error()));
        Self {
            value: Some(value),
            problems,
            failed: false,
        }
    }

    /// Error without a value.
    pub fn error(problems: Vec<Problem>) -> Self {
        Self {
            value: None,
            problems,
            failed: true,
        }
    }

    /// Error with a partial value for downstream reporting.
    pub fn error_with(value: T, problems: Vec<Problem>) -> Self {
        Self {
            value: Some(value),
            problems,
            failed: true,
        }
    }

    /// Build a result whose error state is derived from the problems.
    pub fn of(value: Option<T>, problems: Vec<Problem>) -> Self {
        let failed = problems.iter().any(Problem::is_error);
        Self {
            value,
            problems,
            failed,
        }
    }

    /// New result with one more problem appended.
    pub fn with_problem(self, problem: Problem) -> Self {
        self.with_problems(vec![problem])
    }

    /// New result with the given problems appended in order.
    ///
    /// The error state is updated, never cleared.
    pub fn with_problems(mut self, problems: Vec<Problem>) -> Self {
        self.failed = self.failed || problems.iter().any(Problem::is_error);
        self.problems.extend(problems);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.failed
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn into_parts(self) -> (Option<T>, Vec<Problem>) {
        (self.value, self.problems)
    }

    /// Map the carried value, keeping diagnostics and error state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            problems: self.problems,
            failed: self.failed,
        }
    }

    /// Combine many results into one.
    ///
    /// Values present in the inputs are collected in order, diagnostics are
    /// concatenated in input order, and the combined result fails iff any
    /// input failed.
    pub fn collect(results: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
        let mut values = Vec::new();
        let mut problems = Vec::new();
        let mut failed = false;
        for result in results {
            failed = failed || result.failed;
            values.extend(result.value);
            problems.extend(result.problems);
        }
        Outcome {
            value: Some(values),
            problems,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Severity;

    fn warning(text: &str) -> Problem {
        Problem::warning(text, "")
    }

    fn error(text: &str) -> Problem {
        Problem::error(text, "")
    }

    #[test]
    fn success_has_no_errors() {
        let outcome = Outcome::success(1);
        assert!(!outcome.has_errors());
        assert_eq!(outcome.value(), Some(&1));
        assert!(outcome.problems().is_empty());
    }

    #[test]
    fn of_derives_error_state() {
        assert!(!Outcome::of(Some(1), vec![warning("w")]).has_errors());
        assert!(Outcome::of(Some(1), vec![error("e")]).has_errors());
    }

    #[test]
    fn error_state_is_sticky() {
        let outcome = Outcome::error_with(1, vec![error("e")]).with_problem(warning("w"));
        assert!(outcome.has_errors());
        assert_eq!(outcome.problems().len(), 2);
    }

    #[test]
    fn with_problem_upgrades_to_error() {
        let outcome = Outcome::success(1).with_problem(error("late"));
        assert!(outcome.has_errors());
    }

    #[test]
    fn collect_concatenates_in_order() {
        let combined = Outcome::collect(vec![
            Outcome::success_with(1, vec![warning("first")]),
            Outcome::error(vec![error("second")]),
            Outcome::success(3),
        ]);

        assert!(combined.has_errors());
        assert_eq!(combined.value(), Some(&vec![1, 3]));
        let messages: Vec<_> = combined.problems().iter().map(|p| p.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }
}
