//! Build plan composition.
//!
//! The [`Composer`] turns every target of a [`Registry`] into a
//! [`BuildPlanRecord`]: the resolved toolchain, the final settings of each
//! tool role, the ordered module set and the artifacts to produce. Records
//! are plain data handed to an external build executor.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::builder::errors::{ComposeError, PlanError};
use crate::builder::toolchain::{CommandSpec, EnvSignals, ToolchainProfile, ToolchainResolver};
use crate::core::module_ref::{ModuleOrigin, ResolvedModule};
use crate::core::registry::Registry;
use crate::core::settings::{Role, Settings};
use crate::core::target::{FeatureToggles, Target, TargetKind};
use crate::core::template::TemplateError;
use crate::resolver::resolve_modules;
use crate::sources::FetchRequest;
use crate::util::hash::Fingerprint;

/// How the test harness is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "file", rename_all = "kebab-case")]
pub enum TestArtifact {
    /// A standalone test executable
    Executable(String),
    /// A library linked by an external harness
    LibraryOnly(String),
}

impl TestArtifact {
    /// Output file name.
    pub fn file(&self) -> &str {
        match self {
            TestArtifact::Executable(file) | TestArtifact::LibraryOnly(file) => file,
        }
    }
}

/// Files a target produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    /// Static libraries
    pub libraries: Vec<String>,
    /// Executables; empty when binaries are disabled
    pub executables: Vec<String>,
    /// Test harness artifact
    pub test: TestArtifact,
}

impl ArtifactSet {
    fn compute(target: &Target, profile: &ToolchainProfile) -> Self {
        let toggles = target.toggles();

        let executables = if toggles.binaries {
            target
                .bins()
                .iter()
                .map(|bin| profile.exe_filename(bin))
                .collect()
        } else {
            Vec::new()
        };

        let test_name = format!("{}-test", target.name());
        let test = if toggles.test_lib_only || !toggles.binaries {
            TestArtifact::LibraryOnly(profile.static_lib_filename(&test_name))
        } else {
            TestArtifact::Executable(profile.exe_filename(&test_name))
        };

        ArtifactSet {
            libraries: vec![profile.static_lib_filename(target.name())],
            executables,
            test,
        }
    }

    /// Whether any artifact needs the link role.
    pub fn needs_link(&self) -> bool {
        !self.executables.is_empty() || matches!(self.test, TestArtifact::Executable(_))
    }
}

/// The finalized configuration of one target.
///
/// Produced by [`Composer::compose`]; there is no way to mutate a record
/// after it is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPlanRecord {
    target: String,
    kind: TargetKind,
    toolchain: ToolchainProfile,
    settings: BTreeMap<Role, Settings>,
    dependencies: Vec<ResolvedModule>,
    toggles: FeatureToggles,
    artifacts: ArtifactSet,
}

impl BuildPlanRecord {
    /// Target name.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Target kind.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Resolved toolchain.
    pub fn toolchain(&self) -> &ToolchainProfile {
        &self.toolchain
    }

    /// Resolved settings of one role.
    pub fn settings(&self, role: Role) -> Option<&Settings> {
        self.settings.get(&role)
    }

    /// All resolved roles.
    pub fn roles(&self) -> &BTreeMap<Role, Settings> {
        &self.settings
    }

    /// Included modules in declaration order.
    pub fn dependencies(&self) -> &[ResolvedModule] {
        &self.dependencies
    }

    /// Final toggle values.
    pub fn toggles(&self) -> &FeatureToggles {
        &self.toggles
    }

    /// Files to produce.
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Remote modules that must be fetched before building this target.
    pub fn fetch_requests(&self) -> Vec<FetchRequest> {
        self.dependencies
            .iter()
            .filter_map(|module| match &module.origin {
                ModuleOrigin::Remote { locator, reference } => Some(FetchRequest {
                    name: module.name.clone(),
                    locator: locator.clone(),
                    reference: reference.clone(),
                }),
                ModuleOrigin::Core => None,
            })
            .collect()
    }

    /// Render the command line for one role.
    ///
    /// `flags` and `libs` are filled in from the resolved settings using the
    /// toolchain's flag conventions, and the link-only library flag slots
    /// default to empty. Entries in `values` take precedence. A placeholder
    /// that still has no value is a [`ComposeError::TemplateSubstitution`].
    pub fn render_command(
        &self,
        role: Role,
        values: &BTreeMap<String, String>,
    ) -> Result<CommandSpec, ComposeError> {
        let missing = || ComposeError::MissingRole {
            target: self.target.clone(),
            role,
        };

        let settings = self.settings.get(&role).ok_or_else(missing)?;
        let program = settings.command().ok_or_else(missing)?;
        let template = settings.option_template().ok_or_else(missing)?;

        let mut all = self.default_values(role, settings);
        all.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));

        let rendered = template.render(&all).map_err(|e| match e {
            TemplateError::MissingValue { placeholder } => ComposeError::TemplateSubstitution {
                target: self.target.clone(),
                role,
                placeholder,
            },
        })?;

        Ok(CommandSpec::new(program).args(rendered.split_whitespace()))
    }

    fn default_values(&self, role: Role, settings: &Settings) -> BTreeMap<String, String> {
        let conventions = self.toolchain.conventions();
        let mut flags: Vec<String> = settings.flags().to_vec();
        let mut values = BTreeMap::new();

        if role.is_compile() {
            flags.extend(
                settings
                    .include_paths()
                    .iter()
                    .map(|p| format!("{}{}", conventions.include_prefix, p)),
            );
            flags.extend(
                settings
                    .defines()
                    .iter()
                    .map(|d| format!("{}{}", conventions.define_prefix, d)),
            );
        }

        if role == Role::Link {
            flags.extend(
                settings
                    .library_paths()
                    .iter()
                    .map(|p| format!("{}{}", conventions.library_path_prefix, p)),
            );
            let libs: Vec<String> = settings
                .libraries()
                .iter()
                .map(|l| {
                    format!(
                        "{}{}{}",
                        conventions.library_prefix, l, conventions.library_suffix
                    )
                })
                .collect();
            values.insert("libs".to_string(), libs.join(" "));
            values.insert("flags_before_libraries".to_string(), String::new());
            values.insert("flags_after_libraries".to_string(), String::new());
        }

        values.insert("flags".to_string(), flags.join(" "));
        values
    }

    /// SHA-256 over every resolved field.
    ///
    /// Two records compare equal exactly when their fingerprints do, so
    /// composing the same configuration twice can be checked cheaply.
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.target)
            .update_bool(self.kind == TargetKind::Cross);
        hash_toolchain(&mut fp, &self.toolchain);

        for (role, settings) in &self.settings {
            fp.update_str(role.as_str())
                .update_opt(settings.command())
                .update_strs(settings.flags().iter().map(String::as_str))
                .update_strs(settings.include_paths().iter().map(String::as_str))
                .update_strs(settings.defines().iter().map(String::as_str))
                .update_opt(settings.option_template().map(|t| t.as_str()))
                .update_strs(settings.libraries().iter().map(String::as_str))
                .update_strs(settings.library_paths().iter().map(String::as_str))
                .update_opt(settings.derived_from().map(|r| r.as_str()));
        }

        for module in &self.dependencies {
            fp.update_str(&module.name)
                .update_str(&module.origin.describe());
        }

        fp.update_bool(self.toggles.debug)
            .update_bool(self.toggles.cxx_exceptions)
            .update_bool(self.toggles.binaries)
            .update_bool(self.toggles.test_lib_only)
            .update_strs(self.artifacts.libraries.iter().map(String::as_str))
            .update_strs(self.artifacts.executables.iter().map(String::as_str))
            .update_str(self.artifacts.test.file());

        fp.finish()
    }

    /// Pretty JSON for the build executor.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn hash_toolchain(fp: &mut Fingerprint, profile: &ToolchainProfile) {
    fp.update_str(profile.name())
        .update_str(profile.family().as_str());

    for role in Role::ALL {
        fp.update_opt(profile.command(role))
            .update_opt(profile.template(role).map(|t| t.as_str()));
    }

    let c = profile.conventions();
    fp.update_str(&c.include_prefix)
        .update_str(&c.define_prefix)
        .update_str(&c.library_prefix)
        .update_str(&c.library_suffix)
        .update_str(&c.library_path_prefix)
        .update_strs(c.debug_flags.iter().map(String::as_str))
        .update_str(&c.no_exceptions_flag)
        .update_strs(c.exception_runtime.iter().map(String::as_str))
        .update_str(&c.static_lib_prefix)
        .update_str(&c.static_lib_extension)
        .update_str(&c.exe_extension);
}

/// Result of composing one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    /// Target name
    pub target: String,
    /// The record, or why it could not be built
    pub result: Result<BuildPlanRecord, ComposeError>,
}

/// Per-target results of one composition, in registration order.
///
/// A failing target does not stop the others from being composed.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    outcomes: Vec<TargetOutcome>,
}

impl PlanOutcome {
    /// All outcomes.
    pub fn outcomes(&self) -> &[TargetOutcome] {
        &self.outcomes
    }

    /// Successfully composed records.
    pub fn records(&self) -> Vec<&BuildPlanRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .collect()
    }

    /// Errors of the failing targets.
    pub fn errors(&self) -> Vec<&ComposeError> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err())
            .collect()
    }

    /// Record for a target, if it composed.
    pub fn record(&self, target: &str) -> Option<&BuildPlanRecord> {
        self.outcomes
            .iter()
            .find(|o| o.target == target)
            .and_then(|o| o.result.as_ref().ok())
    }

    /// Whether every target composed.
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// All records, or every error when at least one target failed.
    pub fn into_result(self) -> Result<Vec<BuildPlanRecord>, PlanError> {
        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(record) => records.push(record),
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            Ok(records)
        } else {
            Err(PlanError { failures })
        }
    }
}

/// Builds plan records from a registry.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    resolver: ToolchainResolver,
}

impl Composer {
    /// Create a composer that selects toolchains with `resolver`.
    pub fn new(resolver: ToolchainResolver) -> Self {
        Composer { resolver }
    }

    /// The toolchain resolver.
    pub fn resolver(&self) -> &ToolchainResolver {
        &self.resolver
    }

    /// Compose every target of `registry`.
    ///
    /// The registry is only read, so the same registry can be composed
    /// again (or with other signals) and yields identical records for
    /// identical input.
    pub fn compose(&self, registry: &Registry, env: &EnvSignals) -> PlanOutcome {
        let outcomes = registry
            .targets()
            .iter()
            .map(|target| {
                let result = self.compose_target(target, registry, env);
                if let Err(ref e) = result {
                    tracing::debug!("target `{}` failed to compose: {}", target.name(), e);
                }
                TargetOutcome {
                    target: target.name().to_string(),
                    result,
                }
            })
            .collect();

        PlanOutcome { outcomes }
    }

    /// Compose a single target.
    pub fn compose_target(
        &self,
        target: &Target,
        registry: &Registry,
        env: &EnvSignals,
    ) -> Result<BuildPlanRecord, ComposeError> {
        let profile = self.select_toolchain(target, env)?;

        if let Some(&(role, from)) = target.failed_derivations().first() {
            return Err(ComposeError::UnknownRoleDerivation {
                target: target.name().to_string(),
                role,
                from,
            });
        }

        let mut settings = BTreeMap::new();
        for (&role, configured) in target.roles() {
            let mut resolved = configured.clone();
            seed_from_profile(&mut resolved, role, &profile);

            if let Some(template) = resolved.option_template() {
                if let Some(unknown) = template.first_unknown(role.placeholders()) {
                    return Err(ComposeError::TemplateSubstitution {
                        target: target.name().to_string(),
                        role,
                        placeholder: unknown.to_string(),
                    });
                }
            }

            apply_toggles(&mut resolved, role, target.toggles(), &profile);
            settings.insert(role, resolved);
        }

        let dependencies = resolve_modules(target, registry)?;
        let artifacts = ArtifactSet::compute(target, &profile);

        tracing::debug!(
            "composed target `{}` with {}: {} role(s), {} module(s)",
            target.name(),
            profile,
            settings.len(),
            dependencies.len()
        );

        Ok(BuildPlanRecord {
            target: target.name().to_string(),
            kind: target.kind(),
            toolchain: profile,
            settings,
            dependencies,
            toggles: *target.toggles(),
            artifacts,
        })
    }

    fn select_toolchain(
        &self,
        target: &Target,
        env: &EnvSignals,
    ) -> Result<ToolchainProfile, ComposeError> {
        if let Some(profile) = target.toolchain() {
            tracing::debug!("target `{}` pins toolchain {}", target.name(), profile);
            return Ok(profile.clone());
        }

        if target.kind() == TargetKind::Cross {
            return Err(ComposeError::UnresolvedToolchain {
                target: target.name().to_string(),
                reason: "cross targets must pin a toolchain".to_string(),
            });
        }

        self.resolver
            .resolve(env)
            .cloned()
            .map_err(|e| ComposeError::UnresolvedToolchain {
                target: target.name().to_string(),
                reason: e.to_string(),
            })
    }
}

fn seed_from_profile(settings: &mut Settings, role: Role, profile: &ToolchainProfile) {
    if settings.command().is_none() {
        if let Some(command) = profile.command(role) {
            settings.set_command(command);
        }
    }
    if settings.option_template().is_none() {
        if let Some(template) = profile.template(role) {
            settings.set_option_template(template.clone());
        }
    }
}

fn apply_toggles(
    settings: &mut Settings,
    role: Role,
    toggles: &FeatureToggles,
    profile: &ToolchainProfile,
) {
    let conventions = profile.conventions();

    if role.is_compile() {
        if toggles.debug {
            settings.append_flags(conventions.debug_flags.iter().cloned());
        }
        if !toggles.cxx_exceptions && !conventions.no_exceptions_flag.is_empty() {
            settings.append_flags([conventions.no_exceptions_flag.as_str()]);
        }
    }

    if role == Role::Link && !toggles.cxx_exceptions {
        settings.remove_libraries(&conventions.exception_runtime);
    }
}
