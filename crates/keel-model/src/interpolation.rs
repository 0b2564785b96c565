//! `${…}` expression expansion over the assembled descriptor.
//!
//! Expansion runs to a fixed point against a read-only property stack:
//! descriptor properties are weakest, then system properties, then user
//! properties. `project.*` accessors resolve against the descriptor being
//! interpolated. Unknown expressions are left literal; cyclic expressions
//! are reported as errors and left literal.

use std::collections::BTreeMap;

use crate::descriptor::Descriptor;
use crate::outcome::Outcome;
use crate::problem::Problem;

/// Read-only view of the properties visible to one interpolation run.
pub struct PropertyStack<'a> {
    pub system: &'a BTreeMap<String, String>,
    pub user: &'a BTreeMap<String, String>,
}

struct Interpolator<'a> {
    stack: &'a PropertyStack<'a>,
    descriptor_properties: BTreeMap<String, String>,
    project: ProjectRefs,
    source: String,
    problems: Vec<Problem>,
}

struct ProjectRefs {
    group: Option<String>,
    name: String,
    version: Option<String>,
    base_dir: Option<String>,
}

/// Expand every interpolatable field of an assembled descriptor.
///
/// Coordinates (`group`, `name`), the parent reference, and module fragments
/// stay literal: they must be derivable without interpolation.
pub fn interpolate(descriptor: Descriptor, stack: &PropertyStack<'_>) -> Outcome<Descriptor> {
    let mut engine = Interpolator {
        stack,
        descriptor_properties: descriptor.properties.clone(),
        project: ProjectRefs {
            group: descriptor.group.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            base_dir: descriptor
                .base_dir()
                .map(|dir| dir.display().to_string()),
        },
        source: descriptor.source_hint(),
        problems: Vec::new(),
    };

    let mut descriptor = descriptor;

    descriptor.version = descriptor.version.map(|v| engine.expand(&v));
    engine.project.version = descriptor.version.clone();

    descriptor.url = descriptor.url.map(|u| normalize_url(&engine.expand(&u)));

    let properties = descriptor.properties.clone();
    for (key, value) in properties {
        let expanded = engine.expand(&value);
        descriptor.properties.insert(key, expanded);
    }
    engine.descriptor_properties = descriptor.properties.clone();

    for dependency in descriptor
        .dependencies
        .iter_mut()
        .chain(descriptor.managed_dependencies.iter_mut())
    {
        dependency.group = engine.expand(&dependency.group);
        dependency.name = engine.expand(&dependency.name);
        dependency.version = dependency.version.take().map(|v| engine.expand(&v));
    }

    for plugin in descriptor
        .plugins
        .iter_mut()
        .chain(descriptor.managed_plugins.iter_mut())
    {
        plugin.group = engine.expand(&plugin.group);
        plugin.name = engine.expand(&plugin.name);
        plugin.version = plugin.version.take().map(|v| engine.expand(&v));
        for value in plugin.config.values_mut() {
            *value = engine.expand(value);
        }
        for execution in &mut plugin.executions {
            for value in execution.config.values_mut() {
                *value = engine.expand(value);
            }
        }
    }

    for repository in &mut descriptor.repositories {
        repository.url = normalize_url(&engine.expand(&repository.url));
    }

    Outcome::of(Some(descriptor), engine.problems)
}

impl Interpolator<'_> {
    fn expand(&mut self, input: &str) -> String {
        let mut visiting = Vec::new();
        self.expand_inner(input, &mut visiting)
    }

    fn expand_inner(&mut self, input: &str, visiting: &mut Vec<String>) -> String {
        if !input.contains("${") {
            return input.to_string();
        }

        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // unterminated expression, keep the tail literal
                out.push_str(&rest[start..]);
                return out;
            };
            let key = &after[..end];
            match self.resolve(key) {
                Some(_) if visiting.iter().any(|k| k == key) => {
                    let mut chain = visiting.clone();
                    chain.push(key.to_string());
                    self.problems.push(Problem::error(
                        format!(
                            "expression cycle while expanding ${{{key}}}: {}",
                            chain.join(" -> ")
                        ),
                        self.source.clone(),
                    ));
                    out.push_str(&rest[start..start + 2 + end + 1]);
                }
                Some(value) => {
                    visiting.push(key.to_string());
                    let expanded = self.expand_inner(&value, visiting);
                    visiting.pop();
                    out.push_str(&expanded);
                }
                None => {
                    out.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn resolve(&self, key: &str) -> Option<String> {
        if let Some(accessor) = key.strip_prefix("project.") {
            return match accessor {
                "group" => self.project.group.clone(),
                "name" => Some(self.project.name.clone()),
                "version" => self.project.version.clone(),
                "base_dir" => self.project.base_dir.clone(),
                _ => None,
            };
        }
        self.stack
            .user
            .get(key)
            .or_else(|| self.stack.system.get(key))
            .or_else(|| self.descriptor_properties.get(key))
            .cloned()
    }
}

/// Collapse `/./` and `<seg>/../` segments in the path part of a URL.
pub fn normalize_url(url: &str) -> String {
    let (head, path) = match url.find("://") {
        Some(idx) => {
            let after = &url[idx + 3..];
            match after.find('/') {
                Some(slash) => (&url[..idx + 3 + slash], &after[slash..]),
                None => return url.to_string(),
            }
        }
        None => ("", url),
    };

    let trailing_slash = path.ends_with('/') && path.len() > 1;
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut out = String::from(head);
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    if segments.is_empty() || trailing_slash {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Dependency;
    use crate::problem::Severity;

    fn empty() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn properties(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn run(descriptor: Descriptor, system: BTreeMap<String, String>, user: BTreeMap<String, String>) -> Outcome<Descriptor> {
        interpolate(
            descriptor,
            &PropertyStack {
                system: &system,
                user: &user,
            },
        )
    }

    #[test]
    fn expands_from_descriptor_properties() {
        let mut descriptor = Descriptor::named("app");
        descriptor.properties = properties(&[("rev", "1.0")]);
        descriptor.version = Some("${rev}".into());

        let result = run(descriptor, empty(), empty());
        assert!(!result.has_errors());
        assert_eq!(result.value().unwrap().version.as_deref(), Some("1.0"));
    }

    #[test]
    fn user_properties_win_over_system_and_descriptor() {
        let mut descriptor = Descriptor::named("app");
        descriptor.properties = properties(&[("rev", "descriptor")]);
        descriptor.version = Some("${rev}".into());

        let result = run(
            descriptor,
            properties(&[("rev", "system")]),
            properties(&[("rev", "user")]),
        );
        assert_eq!(result.value().unwrap().version.as_deref(), Some("user"));
    }

    #[test]
    fn project_accessors_resolve() {
        let mut descriptor = Descriptor::named("app");
        descriptor.group = Some("com.x".into());
        descriptor.version = Some("1.0".into());
        descriptor.dependencies.push(Dependency {
            version: Some("${project.version}".into()),
            ..Dependency::new("com.x", "lib")
        });

        let result = run(descriptor, empty(), empty());
        assert_eq!(
            result.value().unwrap().dependencies[0].version.as_deref(),
            Some("1.0")
        );
    }

    #[test]
    fn nested_expansion_reaches_fixed_point() {
        let mut descriptor = Descriptor::named("app");
        descriptor.properties = properties(&[("a", "${b}-suffix"), ("b", "base")]);
        descriptor.version = Some("${a}".into());

        let result = run(descriptor, empty(), empty());
        assert_eq!(
            result.value().unwrap().version.as_deref(),
            Some("base-suffix")
        );
    }

    #[test]
    fn unknown_expression_stays_literal() {
        let mut descriptor = Descriptor::named("app");
        descriptor.version = Some("${undefined}".into());

        let result = run(descriptor, empty(), empty());
        assert!(!result.has_errors());
        assert_eq!(
            result.value().unwrap().version.as_deref(),
            Some("${undefined}")
        );
    }

    #[test]
    fn expression_cycle_is_reported() {
        let mut descriptor = Descriptor::named("app");
        descriptor.properties = properties(&[("a", "${b}"), ("b", "${a}")]);
        descriptor.version = Some("${a}".into());

        let result = run(descriptor, empty(), empty());
        assert!(result.has_errors());
        assert!(result
            .problems()
            .iter()
            .any(|p| p.severity == Severity::Error && p.message.contains("cycle")));
    }

    #[test]
    fn url_normalization() {
        assert_eq!(
            normalize_url("https://x.example/a/./b/../c"),
            "https://x.example/a/c"
        );
        assert_eq!(
            normalize_url("https://x.example/a/b/"),
            "https://x.example/a/b/"
        );
        assert_eq!(normalize_url("https://x.example"), "https://x.example");
    }
}
