//! Berth.toml manifest parsing and schema.
//!
//! The manifest is the declarative way to populate a [`Registry`] and a
//! [`ToolchainResolver`]:
//!
//! ```toml
//! [toolchain]
//! default = "gcc"
//!
//! [[toolchain.signal]]
//! any = ["VisualStudioVersion", "VSINSTALLDIR"]
//! use = "msvc"
//!
//! [gembox.default]
//! core = ["mruby-print", "mruby-math"]
//!
//! [[target]]
//! name = "RX630"
//! kind = "cross"
//! toolchain = "gcc"
//! prefix = "/usr/share/gnurx/bin/rx-elf-"
//! cxx-exceptions = false
//!
//! [target.role.cc]
//! flags = "-Wall -g -Os"
//!
//! [target.role.cxx]
//! derive = "cc"
//!
//! [[target.gem]]
//! github = "takjn/mruby-arduino"
//! branch = "master"
//! ```
//!
//! Within a target, gemboxes are declared before single gems, and a role
//! with `derive` is configured after the role it copies. Roles whose
//! derivations form a cycle are reported when the plan is composed.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use serde::Deserialize;
use thiserror::Error;

use crate::builder::toolchain::{ToolchainProfile, ToolchainResolver};
use crate::core::module_ref::{Gembox, ModuleRef};
use crate::core::registry::{Registry, RegistryError};
use crate::core::settings::Role;
use crate::core::target::{FeatureToggles, Target, TargetKind};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Berth.toml";

/// Error while reading a manifest.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ManifestError {
    #[error("failed to parse manifest: {message}")]
    #[diagnostic(code(berth::manifest::parse))]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("{context}: unknown toolchain `{name}`")]
    #[diagnostic(code(berth::manifest::unknown_toolchain))]
    UnknownToolchain {
        context: String,
        name: String,
        #[help]
        help: Option<String>,
    },

    #[error("target `{target}`: unknown tool role `{role}`")]
    #[diagnostic(
        code(berth::manifest::unknown_role),
        help("Valid roles: cc, cxx, objc, asm, linker, archiver")
    )]
    UnknownRole { target: String, role: String },

    #[error("target `{target}`: `prefix` needs an explicit `toolchain`")]
    #[diagnostic(code(berth::manifest::prefix_without_toolchain))]
    PrefixWithoutToolchain { target: String },

    #[error("{context}: gem #{index} is invalid: {reason}")]
    #[diagnostic(code(berth::manifest::invalid_gem))]
    InvalidGem {
        context: String,
        index: usize,
        reason: String,
    },

    #[error(transparent)]
    #[diagnostic(code(berth::manifest::duplicate))]
    Registry(#[from] RegistryError),
}

/// A parsed manifest: the targets and gemboxes it declares plus the
/// toolchain selection rules.
#[derive(Debug, Clone)]
pub struct Manifest {
    registry: Registry,
    resolver: ToolchainResolver,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("loading manifest {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        let manifest = Self::parse(&content, &path.display().to_string())
            .with_context(|| format!("invalid manifest: {}", path.display()))?;
        Ok(manifest)
    }

    /// Parse manifest content. `name` labels the source in diagnostics.
    pub fn parse(content: &str, name: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
            message: e.message().to_string(),
            src: NamedSource::new(name, content.to_string()),
            span: e.span().map(SourceSpan::from),
        })?;

        let resolver = match raw.toolchain {
            Some(toolchain) => toolchain.into_resolver()?,
            None => ToolchainResolver::standard(),
        };

        let mut registry = Registry::new();
        for (name, gembox) in raw.gembox {
            let gembox = gembox.into_gembox(name)?;
            registry.add_gembox(gembox)?;
        }
        for target in raw.target {
            target.register(&mut registry)?;
        }

        tracing::debug!(
            "manifest declares {} target(s) and {} gembox(es)",
            registry.len(),
            registry.gembox_names().len()
        );

        Ok(Manifest { registry, resolver })
    }

    /// Declared targets and gemboxes.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Toolchain selection rules.
    pub fn resolver(&self) -> &ToolchainResolver {
        &self.resolver
    }

    /// Split into registry and resolver.
    pub fn into_parts(self) -> (Registry, ToolchainResolver) {
        (self.registry, self.resolver)
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Manifest::parse(s, MANIFEST_NAME)
    }
}

/// Raw manifest as parsed from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    toolchain: Option<RawToolchain>,
    #[serde(default)]
    gembox: BTreeMap<String, RawGembox>,
    #[serde(default)]
    target: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawToolchain {
    default: Option<String>,
    #[serde(default)]
    signal: Vec<RawSignal>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSignal {
    any: Vec<String>,
    #[serde(rename = "use")]
    profile: String,
}

impl RawToolchain {
    fn into_resolver(self) -> Result<ToolchainResolver, ManifestError> {
        let mut resolver = ToolchainResolver::new();
        for signal in self.signal {
            let profile = lookup_toolchain("[toolchain.signal]", &signal.profile)?;
            resolver = resolver.with_rule(signal.any.iter().map(String::as_str), profile);
        }
        if let Some(name) = self.default {
            resolver = resolver.with_default(lookup_toolchain("[toolchain]", &name)?);
        }
        Ok(resolver)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGembox {
    #[serde(default)]
    core: Vec<String>,
    #[serde(default)]
    gem: Vec<RawGem>,
}

impl RawGembox {
    fn into_gembox(self, name: String) -> Result<Gembox, ManifestError> {
        let context = format!("gembox `{}`", name);
        let mut gembox = Gembox::new(name).core_gems(self.core);
        for (index, gem) in self.gem.into_iter().enumerate() {
            gembox = gembox.gem(gem.into_module(&context, index)?);
        }
        Ok(gembox)
    }
}

/// Flags as a whitespace-separated string or a token array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFlags {
    Line(String),
    Tokens(Vec<String>),
}

impl RawFlags {
    fn into_tokens(self) -> Vec<String> {
        match self {
            RawFlags::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            RawFlags::Tokens(tokens) => tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawRole {
    command: Option<String>,
    /// Replaces every flag, including inherited ones
    flags: Option<RawFlags>,
    append_flags: Option<RawFlags>,
    #[serde(default)]
    include_paths: Vec<String>,
    #[serde(default)]
    defines: Vec<String>,
    template: Option<String>,
    derive: Option<String>,
    #[serde(default)]
    libraries: Vec<String>,
    #[serde(default)]
    library_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawGem {
    core: Option<String>,
    github: Option<String>,
    bitbucket: Option<String>,
    git: Option<String>,
    branch: Option<String>,
    tag: Option<String>,
    rev: Option<String>,
    #[serde(default = "default_true")]
    included: bool,
}

fn default_true() -> bool {
    true
}

impl RawGem {
    fn into_module(self, context: &str, index: usize) -> Result<ModuleRef, ManifestError> {
        let invalid = |reason: String| ManifestError::InvalidGem {
            context: context.to_string(),
            index,
            reason,
        };

        let sources = [&self.core, &self.github, &self.bitbucket, &self.git]
            .iter()
            .filter(|s| s.is_some())
            .count();
        if sources != 1 {
            return Err(invalid(
                "exactly one of `core`, `github`, `bitbucket` or `git` is required".to_string(),
            ));
        }

        let references = [&self.branch, &self.tag, &self.rev]
            .iter()
            .filter(|r| r.is_some())
            .count();
        if references > 1 {
            return Err(invalid(
                "at most one of `branch`, `tag` or `rev` may be set".to_string(),
            ));
        }

        let module = if let Some(name) = self.core {
            if references > 0 {
                return Err(invalid(format!(
                    "core module `{}` cannot pin a git reference",
                    name
                )));
            }
            ModuleRef::core(name)
        } else {
            let remote = match (self.github, self.bitbucket, self.git) {
                (Some(repo), _, _) => ModuleRef::github(&repo),
                (_, Some(repo), _) => ModuleRef::bitbucket(&repo),
                (_, _, Some(url)) => ModuleRef::git(&url),
                (None, None, None) => return Err(invalid("no module source".to_string())),
            };
            let mut remote = remote.map_err(|e| invalid(format!("{:#}", e)))?;

            if let Some(branch) = self.branch {
                remote = remote.branch(branch);
            } else if let Some(tag) = self.tag {
                remote = remote.tag(tag);
            } else if let Some(rev) = self.rev {
                remote = remote.rev(rev);
            }
            remote
        };

        Ok(module.included(self.included))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawTarget {
    name: String,
    #[serde(default)]
    kind: TargetKind,
    toolchain: Option<String>,
    prefix: Option<String>,
    #[serde(default)]
    debug: bool,
    cxx_exceptions: Option<bool>,
    binaries: Option<bool>,
    #[serde(default)]
    bins: Vec<String>,
    #[serde(default)]
    test_lib_only: bool,
    #[serde(default)]
    gembox: Vec<String>,
    #[serde(default)]
    role: BTreeMap<String, RawRole>,
    #[serde(default)]
    gem: Vec<RawGem>,
}

impl RawTarget {
    fn register(self, registry: &mut Registry) -> Result<(), ManifestError> {
        let RawTarget {
            name,
            kind,
            toolchain,
            prefix,
            debug,
            cxx_exceptions,
            binaries,
            bins,
            test_lib_only,
            gembox,
            role,
            gem,
        } = self;
        let context = format!("target `{}`", name);

        let toolchain = match (toolchain, prefix) {
            (Some(toolchain), prefix) => {
                let profile = lookup_toolchain(&context, &toolchain)?;
                Some(match prefix {
                    Some(prefix) => profile.with_prefix(&prefix),
                    None => profile,
                })
            }
            (None, Some(_)) => return Err(ManifestError::PrefixWithoutToolchain { target: name }),
            (None, None) => None,
        };

        let mut roles = Vec::with_capacity(role.len());
        for (key, raw) in role {
            let parsed = parse_role(&name, &key)?;
            let derive = match raw.derive.as_deref() {
                Some(from) => Some(parse_role(&name, from)?),
                None => None,
            };
            roles.push((parsed, derive, raw));
        }
        let (roles, cyclic) = order_roles(roles);
        if !cyclic.is_empty() {
            tracing::debug!(
                "target `{}`: {} role derivation(s) form a cycle",
                name,
                cyclic.len()
            );
        }

        let gems = gem
            .into_iter()
            .enumerate()
            .map(|(index, gem)| gem.into_module(&context, index))
            .collect::<Result<Vec<_>, _>>()?;

        let toggles = FeatureToggles {
            debug,
            cxx_exceptions: cxx_exceptions.unwrap_or(true),
            binaries: binaries.unwrap_or(true),
            test_lib_only,
        };

        let configure = move |target: &mut Target| {
            if let Some(profile) = toolchain {
                target.set_toolchain(profile);
            }
            for (role, derive, raw) in roles {
                apply_role(target, role, derive, raw);
            }
            for (role, from) in cyclic {
                target.record_failed_derivation(role, from);
            }
            target.set_toggles(toggles).set_bins(bins);
            for name in gembox {
                target.gembox(name);
            }
            for module in gems {
                target.gem(module);
            }
        };

        match kind {
            TargetKind::Host => registry.register_target(&name, configure)?,
            TargetKind::Cross => registry.register_cross_target(&name, configure)?,
        };
        Ok(())
    }
}

type RoleEntry = (Role, Option<Role>, RawRole);

/// Order role tables so every role is configured after the role it derives
/// from. Entries that can never become ready (a derivation cycle, or a
/// chain leading into one) are returned separately as `(role, from)`.
fn order_roles(mut pending: Vec<RoleEntry>) -> (Vec<RoleEntry>, Vec<(Role, Role)>) {
    let mut ordered = Vec::with_capacity(pending.len());

    loop {
        let ready = pending.iter().position(|(_, derive, _)| match derive {
            Some(from) => !pending.iter().any(|(role, _, _)| role == from),
            None => true,
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => break,
        }
    }

    let cyclic = pending
        .into_iter()
        .filter_map(|(role, derive, _)| derive.map(|from| (role, from)))
        .collect();
    (ordered, cyclic)
}

fn apply_role(target: &mut Target, role: Role, derive: Option<Role>, raw: RawRole) {
    let settings = match derive {
        Some(from) => target.derive_role(role, from),
        None => target.settings_mut(role),
    };

    if let Some(command) = raw.command {
        settings.set_command(command);
    }
    if let Some(flags) = raw.flags {
        settings.replace_flags(flags.into_tokens());
    }
    if let Some(flags) = raw.append_flags {
        settings.append_flags(flags.into_tokens());
    }
    if let Some(template) = raw.template {
        settings.set_option_template(template);
    }
    settings
        .add_include_paths(raw.include_paths)
        .add_defines(raw.defines)
        .add_libraries(raw.libraries)
        .add_library_paths(raw.library_paths);
}

fn parse_role(target: &str, name: &str) -> Result<Role, ManifestError> {
    name.parse().map_err(|_| ManifestError::UnknownRole {
        target: target.to_string(),
        role: name.to_string(),
    })
}

fn lookup_toolchain(context: &str, name: &str) -> Result<ToolchainProfile, ManifestError> {
    ToolchainProfile::by_name(name).ok_or_else(|| ManifestError::UnknownToolchain {
        context: context.to_string(),
        name: name.to_string(),
        help: Some(format!(
            "Known toolchains: {}",
            ToolchainProfile::known_names().join(", ")
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{EnvSignals, ToolchainFamily};
    use crate::core::module_ref::{Declaration, GitReference, ModuleOrigin};

    const RX630: &str = r#"
[gembox.default]
core = ["mruby-print", "mruby-math"]

[[target]]
name = "host"
debug = true
gembox = ["default"]

[[target]]
name = "RX630"
kind = "cross"
toolchain = "gcc"
prefix = "/usr/share/gnurx/bin/rx-elf-"
bins = []
test-lib-only = true
cxx-exceptions = false

[target.role.cc]
flags = "-Wall -g -Os -flto -mcpu=rx600 -m64bit-doubles"
append-flags = ["-DGRSAKURA", "-DARDUINO=100"]
include-paths = ["../gr_common", "../gr_common/core"]
template = "%{flags} -o %{outfile} -c %{infile}"

[target.role.cxx]
derive = "cc"

[target.role.archiver]
template = "rcs %{outfile} %{objs}"

[[target.gem]]
core = "mruby-compiler"

[[target.gem]]
github = "takjn/mruby-arduino"
branch = "master"

[[target.gem]]
core = "mruby-eval"
included = false
"#;

    #[test]
    fn test_parse_host_and_cross() {
        let manifest: Manifest = RX630.parse().unwrap();
        let registry = manifest.registry();
        assert_eq!(registry.len(), 2);

        let host = registry.target("host").unwrap();
        assert_eq!(host.kind(), TargetKind::Host);
        assert!(host.toggles().debug);
        assert_eq!(host.dependencies(), &[Declaration::Gembox("default".to_string())]);

        let rx = registry.target("RX630").unwrap();
        assert_eq!(rx.kind(), TargetKind::Cross);
        assert!(!rx.toggles().cxx_exceptions);
        assert!(rx.toggles().test_lib_only);
        assert_eq!(
            rx.toolchain().unwrap().command(Role::CompileC),
            Some("/usr/share/gnurx/bin/rx-elf-gcc")
        );
        assert_eq!(rx.dependencies().len(), 3);
    }

    #[test]
    fn test_derived_role_sees_source_settings() {
        let manifest: Manifest = RX630.parse().unwrap();
        let rx = manifest.registry().target("RX630").unwrap();

        let cc = rx.settings(Role::CompileC).unwrap();
        let cxx = rx.settings(Role::CompileCxx).unwrap();
        assert_eq!(cc.flags().last().map(String::as_str), Some("-DARDUINO=100"));
        assert_eq!(cxx.flags(), cc.flags());
        assert_eq!(cxx.include_paths(), cc.include_paths());
        assert_eq!(cxx.derived_from(), Some(Role::CompileC));
    }

    #[test]
    fn test_gem_declarations() {
        let manifest: Manifest = RX630.parse().unwrap();
        let rx = manifest.registry().target("RX630").unwrap();

        match &rx.dependencies()[1] {
            Declaration::Module(module) => {
                assert_eq!(module.name(), "mruby-arduino");
                assert_eq!(
                    module.origin(),
                    &ModuleOrigin::Remote {
                        locator: "https://github.com/takjn/mruby-arduino.git".to_string(),
                        reference: GitReference::Branch("master".to_string()),
                    }
                );
            }
            other => panic!("unexpected declaration: {:?}", other),
        }
        match &rx.dependencies()[2] {
            Declaration::Module(module) => assert!(!module.is_included()),
            other => panic!("unexpected declaration: {:?}", other),
        }
    }

    #[test]
    fn test_default_resolver_is_standard() {
        let manifest: Manifest = RX630.parse().unwrap();
        let env = EnvSignals::new().set("VSINSTALLDIR", "C:\\VS");
        let profile = manifest.resolver().resolve(&env).unwrap();
        assert_eq!(profile.family(), ToolchainFamily::Msvc);
    }

    #[test]
    fn test_toolchain_section() {
        let manifest: Manifest = r#"
[toolchain]
default = "clang"

[[toolchain.signal]]
any = ["USE_GCC"]
use = "gcc"
"#
        .parse()
        .unwrap();

        let resolver = manifest.resolver();
        let env = EnvSignals::new().set("USE_GCC", "1");
        assert_eq!(resolver.resolve(&env).unwrap().name(), "gcc");
        assert_eq!(resolver.resolve(&EnvSignals::new()).unwrap().name(), "clang");
    }

    #[test]
    fn test_toolchain_section_without_default() {
        let manifest: Manifest = "[toolchain]\n".parse().unwrap();
        assert!(manifest.resolver().resolve(&EnvSignals::new()).is_err());
    }

    #[test]
    fn test_unknown_toolchain() {
        let err = "[[target]]\nname = \"host\"\ntoolchain = \"tcc\"\n"
            .parse::<Manifest>()
            .unwrap_err();
        assert_eq!(err.to_string(), "target `host`: unknown toolchain `tcc`");
        let help = MietteDiagnostic::help(&err).map(|h| h.to_string());
        assert_eq!(help.as_deref(), Some("Known toolchains: gcc, clang, msvc, visualcpp"));
    }

    #[test]
    fn test_unknown_role() {
        let err = "[[target]]\nname = \"host\"\n[target.role.fortran]\nflags = \"-O2\"\n"
            .parse::<Manifest>()
            .unwrap_err();
        assert!(matches!(err, ManifestError::UnknownRole { ref role, .. } if role == "fortran"));
    }

    #[test]
    fn test_gem_needs_one_source() {
        let err = "[[target]]\nname = \"host\"\n[[target.gem]]\ncore = \"a\"\ngithub = \"x/a\"\n"
            .parse::<Manifest>()
            .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidGem { index: 0, .. }));

        let err = "[[target]]\nname = \"host\"\n[[target.gem]]\ncore = \"a\"\nbranch = \"main\"\n"
            .parse::<Manifest>()
            .unwrap_err();
        assert!(err.to_string().contains("cannot pin a git reference"));
    }

    #[test]
    fn test_prefix_needs_toolchain() {
        let err = "[[target]]\nname = \"rx\"\nprefix = \"rx-elf-\"\n"
            .parse::<Manifest>()
            .unwrap_err();
        assert!(matches!(err, ManifestError::PrefixWithoutToolchain { .. }));
    }

    #[test]
    fn test_duplicate_target() {
        let err = "[[target]]\nname = \"host\"\n[[target]]\nname = \"host\"\n"
            .parse::<Manifest>()
            .unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Registry(RegistryError::DuplicateTarget { .. })
        ));
    }

    #[test]
    fn test_parse_error_has_span() {
        let err = "[[target]]\nname = 42\n".parse::<Manifest>().unwrap_err();
        match err {
            ManifestError::Parse { span, .. } => assert!(span.is_some()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_flags_replace_after_derive() {
        let manifest: Manifest = r#"
[[target]]
name = "host"

[target.role.cc]
flags = ["-Wall", "-O2"]

[target.role.cxx]
derive = "cc"
flags = "-std=c++17"
"#
        .parse()
        .unwrap();

        let host = manifest.registry().target("host").unwrap();
        assert_eq!(host.settings(Role::CompileCxx).unwrap().flags(), &["-std=c++17"]);
        assert_eq!(host.settings(Role::CompileC).unwrap().flags(), &["-Wall", "-O2"]);
    }

    #[test]
    fn test_derivation_chain_follows_sources() {
        let manifest: Manifest = r#"
[[target]]
name = "host"

[target.role.asm]
derive = "cxx"

[target.role.cc]
flags = "-Wall -O2"

[target.role.cxx]
derive = "cc"
"#
        .parse()
        .unwrap();

        let host = manifest.registry().target("host").unwrap();
        assert_eq!(host.settings(Role::CompileCxx).unwrap().flags(), &["-Wall", "-O2"]);
        let asm = host.settings(Role::Assemble).unwrap();
        assert_eq!(asm.flags(), &["-Wall", "-O2"]);
        assert_eq!(asm.derived_from(), Some(Role::CompileCxx));
        assert!(host.failed_derivations().is_empty());
    }

    #[test]
    fn test_derivation_cycle_fails_composition() {
        use crate::builder::errors::ComposeError;
        use crate::builder::plan::Composer;

        let manifest: Manifest = r#"
[[target]]
name = "host"

[target.role.cc]
derive = "cxx"

[target.role.cxx]
derive = "cc"
"#
        .parse()
        .unwrap();

        let composer = Composer::new(manifest.resolver().clone());
        let outcome = composer.compose(manifest.registry(), &EnvSignals::new());
        assert!(matches!(
            outcome.errors()[0],
            ComposeError::UnknownRoleDerivation { .. }
        ));
    }
}
