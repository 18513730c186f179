//! Target registry.
//!
//! A Registry collects every target and gembox declared by one
//! configuration. It is an ordinary value: build as many as needed and
//! hand each one to the composer.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::module_ref::Gembox;
use crate::core::target::{Target, TargetKind};

/// Error while registering targets or gemboxes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("target `{name}` is already registered")]
    DuplicateTarget { name: String },

    #[error("gembox `{name}` is already registered")]
    DuplicateGembox { name: String },
}

/// An ordered collection of targets plus the gemboxes they may reference.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    targets: Vec<Target>,
    gemboxes: BTreeMap<String, Gembox>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a host target and configure it.
    pub fn register_target<F>(&mut self, name: &str, configure: F) -> Result<&Target, RegistryError>
    where
        F: FnOnce(&mut Target),
    {
        self.register(name, TargetKind::Host, configure)
    }

    /// Register a cross target and configure it.
    ///
    /// Cross targets must pin a toolchain inside `configure`.
    pub fn register_cross_target<F>(
        &mut self,
        name: &str,
        configure: F,
    ) -> Result<&Target, RegistryError>
    where
        F: FnOnce(&mut Target),
    {
        self.register(name, TargetKind::Cross, configure)
    }

    fn register<F>(&mut self, name: &str, kind: TargetKind, configure: F) -> Result<&Target, RegistryError>
    where
        F: FnOnce(&mut Target),
    {
        if self.target(name).is_some() {
            return Err(RegistryError::DuplicateTarget {
                name: name.to_string(),
            });
        }

        let mut target = Target::new(name, kind);
        configure(&mut target);
        tracing::debug!("registered {:?} target `{}`", kind, name);

        self.targets.push(target);
        Ok(&self.targets[self.targets.len() - 1])
    }

    /// Register a gembox.
    pub fn add_gembox(&mut self, gembox: Gembox) -> Result<(), RegistryError> {
        if self.gemboxes.contains_key(gembox.name()) {
            return Err(RegistryError::DuplicateGembox {
                name: gembox.name().to_string(),
            });
        }
        self.gemboxes.insert(gembox.name().to_string(), gembox);
        Ok(())
    }

    /// Targets in registration order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Find a target by name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    /// Find a gembox by name.
    pub fn gembox(&self, name: &str) -> Option<&Gembox> {
        self.gemboxes.get(name)
    }

    /// Names of all registered gemboxes, sorted.
    pub fn gembox_names(&self) -> Vec<&str> {
        self.gemboxes.keys().map(String::as_str).collect()
    }

    /// Number of registered targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if no targets are registered.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::module_ref::ModuleRef;

    #[test]
    fn test_registration_order_is_kept() {
        let mut registry = Registry::new();
        registry.register_target("host", |_| {}).unwrap();
        registry.register_cross_target("RX630", |_| {}).unwrap();
        registry.register_target("bench", |_| {}).unwrap();

        let names: Vec<_> = registry.targets().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["host", "RX630", "bench"]);
        assert_eq!(registry.target("RX630").unwrap().kind(), TargetKind::Cross);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mut registry = Registry::new();
        registry.register_target("host", |_| {}).unwrap();
        let err = registry.register_cross_target("host", |_| {}).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateTarget {
                name: "host".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_configure_runs_on_registered_target() {
        let mut registry = Registry::new();
        let target = registry
            .register_target("host", |t| {
                t.enable_debug();
            })
            .unwrap();
        assert!(target.toggles().debug);
    }

    #[test]
    fn test_gembox_registration() {
        let mut registry = Registry::new();
        registry
            .add_gembox(Gembox::new("default").gem(ModuleRef::core("mruby-math")))
            .unwrap();
        assert!(registry.add_gembox(Gembox::new("default")).is_err());
        assert_eq!(registry.gembox("default").unwrap().modules().len(), 1);
        assert_eq!(registry.gembox_names(), vec!["default"]);
    }

    #[test]
    fn test_registries_are_independent() {
        let mut a = Registry::new();
        let mut b = Registry::new();
        a.register_target("host", |_| {}).unwrap();
        b.register_target("host", |_| {}).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
