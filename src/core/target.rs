//! Target definitions - what gets configured.
//!
//! A Target is one independently configured build unit: the host build or
//! a cross build for a specific board. It owns one [`Settings`] per tool
//! role, a set of feature toggles and an ordered module declaration list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::builder::toolchain::ToolchainProfile;
use crate::core::module_ref::{Declaration, ModuleRef};
use crate::core::settings::{Role, Settings};

/// The kind of target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Builds for the machine running the build
    #[default]
    Host,
    /// Builds for another machine; must pin its toolchain
    Cross,
}

/// Independent boolean build switches.
///
/// Only final values matter; setting a toggle twice has no extra effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureToggles {
    /// Add debug-symbol/optimization flags to every compile role
    pub debug: bool,
    /// Allow C++ exceptions
    pub cxx_exceptions: bool,
    /// Produce executables
    pub binaries: bool,
    /// Produce the test library only, without a test executable
    pub test_lib_only: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        FeatureToggles {
            debug: false,
            cxx_exceptions: true,
            binaries: true,
            test_lib_only: false,
        }
    }
}

/// A build target with its configuration.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    kind: TargetKind,
    toolchain: Option<ToolchainProfile>,
    roles: BTreeMap<Role, Settings>,
    toggles: FeatureToggles,
    bins: Vec<String>,
    dependencies: Vec<Declaration>,
    /// (role, missing source) pairs from `derive_role`
    failed_derivations: Vec<(Role, Role)>,
}

impl Target {
    /// Create a target with empty settings for every standard role.
    pub(crate) fn new(name: impl Into<String>, kind: TargetKind) -> Self {
        Target {
            name: name.into(),
            kind,
            toolchain: None,
            roles: Role::STANDARD
                .iter()
                .map(|role| (*role, Settings::new()))
                .collect(),
            toggles: FeatureToggles::default(),
            bins: Vec::new(),
            dependencies: Vec::new(),
            failed_derivations: Vec::new(),
        }
    }

    /// Target name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target kind.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Pin a toolchain, bypassing environment-based selection.
    pub fn set_toolchain(&mut self, profile: ToolchainProfile) -> &mut Self {
        self.toolchain = Some(profile);
        self
    }

    /// The pinned toolchain, if any.
    pub fn toolchain(&self) -> Option<&ToolchainProfile> {
        self.toolchain.as_ref()
    }

    /// Settings for a role, if the role exists on this target.
    pub fn settings(&self, role: Role) -> Option<&Settings> {
        self.roles.get(&role)
    }

    /// Mutable settings for a role. Optional roles are created on first use.
    pub fn settings_mut(&mut self, role: Role) -> &mut Settings {
        self.roles.entry(role).or_default()
    }

    /// All configured roles.
    pub fn roles(&self) -> &BTreeMap<Role, Settings> {
        &self.roles
    }

    /// C compiler settings.
    pub fn cc(&mut self) -> &mut Settings {
        self.settings_mut(Role::CompileC)
    }

    /// C++ compiler settings.
    pub fn cxx(&mut self) -> &mut Settings {
        self.settings_mut(Role::CompileCxx)
    }

    /// Linker settings.
    pub fn linker(&mut self) -> &mut Settings {
        self.settings_mut(Role::Link)
    }

    /// Archiver settings.
    pub fn archiver(&mut self) -> &mut Settings {
        self.settings_mut(Role::Archive)
    }

    /// Replace `role` with a copy of `from`.
    ///
    /// The copy is taken now; later edits to `from` do not reach `role`.
    /// When `from` does not exist on this target, `role` is reset to empty
    /// settings and composition reports the derivation as an error.
    pub fn derive_role(&mut self, role: Role, from: Role) -> &mut Settings {
        let derived = match self.roles.get(&from) {
            Some(source) => {
                let mut copy = source.derive();
                copy.mark_derived_from(from);
                copy
            }
            None => {
                self.record_failed_derivation(role, from);
                Settings::new()
            }
        };
        if derived.derived_from().is_some() {
            self.failed_derivations.retain(|(r, _)| *r != role);
        }
        self.roles.insert(role, derived);
        self.settings_mut(role)
    }

    /// Record that `role` could not be derived from `from`.
    ///
    /// Only the latest derivation of a role counts, so an earlier entry for
    /// the same role is replaced.
    pub(crate) fn record_failed_derivation(&mut self, role: Role, from: Role) {
        self.failed_derivations.retain(|(r, _)| *r != role);
        self.failed_derivations.push((role, from));
    }

    pub(crate) fn failed_derivations(&self) -> &[(Role, Role)] {
        &self.failed_derivations
    }

    /// Feature toggles.
    pub fn toggles(&self) -> &FeatureToggles {
        &self.toggles
    }

    /// Add debug flags to every compile role.
    pub fn enable_debug(&mut self) -> &mut Self {
        self.toggles.debug = true;
        self
    }

    /// Compile without C++ exception support.
    pub fn disable_cxx_exception(&mut self) -> &mut Self {
        self.toggles.cxx_exceptions = false;
        self
    }

    /// Turn executable production on or off.
    pub fn set_binaries_enabled(&mut self, enabled: bool) -> &mut Self {
        self.toggles.binaries = enabled;
        self
    }

    /// Build the test library only, without a standalone test executable.
    pub fn build_test_lib_only(&mut self) -> &mut Self {
        self.toggles.test_lib_only = true;
        self
    }

    /// Replace all toggles at once.
    pub fn set_toggles(&mut self, toggles: FeatureToggles) -> &mut Self {
        self.toggles = toggles;
        self
    }

    /// Executables this target produces when binaries are enabled.
    pub fn bins(&self) -> &[String] {
        &self.bins
    }

    /// Set the executable list.
    pub fn set_bins(&mut self, bins: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.bins = bins.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a module dependency.
    pub fn gem(&mut self, module: ModuleRef) -> &mut Self {
        self.dependencies.push(Declaration::Module(module));
        self
    }

    /// Declare a gembox; it expands in place when the plan is composed.
    pub fn gembox(&mut self, name: impl Into<String>) -> &mut Self {
        self.dependencies.push(Declaration::Gembox(name.into()));
        self
    }

    /// Declarations in order.
    pub fn dependencies(&self) -> &[Declaration] {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_target_has_standard_roles() {
        let t = Target::new("host", TargetKind::Host);
        for role in Role::STANDARD {
            assert!(t.settings(role).is_some());
        }
        assert!(t.settings(Role::Assemble).is_none());
    }

    #[test]
    fn test_default_toggles() {
        let t = Target::new("host", TargetKind::Host);
        assert_eq!(t.toggles(), &FeatureToggles::default());
        assert!(t.toggles().cxx_exceptions);
        assert!(t.toggles().binaries);
        assert!(!t.toggles().debug);
    }

    #[test]
    fn test_toggles_are_idempotent() {
        let mut once = Target::new("a", TargetKind::Host);
        once.enable_debug().disable_cxx_exception();

        let mut twice = Target::new("a", TargetKind::Host);
        twice
            .disable_cxx_exception()
            .enable_debug()
            .enable_debug()
            .disable_cxx_exception();

        assert_eq!(once.toggles(), twice.toggles());
    }

    #[test]
    fn test_derive_role_copies_now() {
        let mut t = Target::new("cross", TargetKind::Cross);
        t.cc().append_flag_str("-Wall -Os");
        t.derive_role(Role::CompileCxx, Role::CompileC)
            .append_flags(["-fno-rtti"]);
        t.cc().append_flags(["-std=c99"]);

        assert_eq!(t.settings(Role::CompileC).unwrap().flags(), &["-Wall", "-Os", "-std=c99"]);
        let cxx = t.settings(Role::CompileCxx).unwrap();
        assert_eq!(cxx.flags(), &["-Wall", "-Os", "-fno-rtti"]);
        assert_eq!(cxx.derived_from(), Some(Role::CompileC));
        assert!(t.failed_derivations().is_empty());
    }

    #[test]
    fn test_derive_from_missing_role_is_recorded() {
        let mut t = Target::new("host", TargetKind::Host);
        t.derive_role(Role::CompileCxx, Role::CompileObjc);
        assert_eq!(
            t.failed_derivations(),
            &[(Role::CompileCxx, Role::CompileObjc)]
        );
    }

    #[test]
    fn test_later_successful_derivation_clears_failure() {
        let mut t = Target::new("host", TargetKind::Host);
        t.derive_role(Role::CompileCxx, Role::Assemble);
        t.settings_mut(Role::Assemble).append_flags(["-x", "assembler"]);
        t.derive_role(Role::CompileCxx, Role::Assemble);

        assert!(t.failed_derivations().is_empty());
        assert_eq!(t.settings(Role::CompileCxx).unwrap().flags(), &["-x", "assembler"]);
    }

    #[test]
    fn test_only_latest_failure_per_role_is_kept() {
        let mut t = Target::new("host", TargetKind::Host);
        t.derive_role(Role::CompileCxx, Role::Assemble);
        t.derive_role(Role::CompileCxx, Role::CompileObjc);
        assert_eq!(
            t.failed_derivations(),
            &[(Role::CompileCxx, Role::CompileObjc)]
        );
    }

    #[test]
    fn test_declarations_keep_order() {
        let mut t = Target::new("host", TargetKind::Host);
        t.gembox("default")
            .gem(ModuleRef::core("mruby-compiler"))
            .gem(ModuleRef::core("mruby-math"));

        assert_eq!(t.dependencies().len(), 3);
        assert_eq!(t.dependencies()[0], Declaration::Gembox("default".to_string()));
    }
}
