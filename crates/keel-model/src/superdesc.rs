//! Bootstrap super-descriptor.
//!
//! Every parent lineage terminates in the super-descriptor: a synthetic
//! ancestor that seeds the defaults every project inherits (the standard
//! repository, managed core plugin versions).

use crate::descriptor::{Descriptor, Plugin, Repository};

/// Provides the bootstrap ancestor appended to every lineage.
pub trait SuperDescriptorProvider {
    fn super_descriptor(&self) -> Descriptor;
}

/// Built-in super-descriptor used when the session supplies no other.
pub struct BuiltinSuperDescriptor;

impl SuperDescriptorProvider for BuiltinSuperDescriptor {
    fn super_descriptor(&self) -> Descriptor {
        let mut descriptor = Descriptor::named("super");
        descriptor.group = Some("org.keel".into());
        descriptor.version = Some("0".into());
        descriptor.repositories.push(Repository {
            id: "central".into(),
            url: "https://repo.keel.build/releases".into(),
        });
        descriptor.managed_plugins.push({
            let mut plugin = Plugin::new("org.keel", "compiler");
            plugin.version = Some("2.1".into());
            plugin
        });
        descriptor.managed_plugins.push({
            let mut plugin = Plugin::new("org.keel", "packager");
            plugin.version = Some("1.4".into());
            plugin
        });
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contributes_repository_and_managed_plugins() {
        let descriptor = BuiltinSuperDescriptor.super_descriptor();
        assert!(descriptor.parent.is_none());
        assert!(descriptor.modules.is_empty());
        assert_eq!(descriptor.repositories[0].id, "central");
        assert!(descriptor
            .managed_plugins
            .iter()
            .all(|p| p.version.is_some()));
    }
}
