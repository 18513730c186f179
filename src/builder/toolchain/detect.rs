//! Toolchain selection from environment signals.

use std::collections::BTreeMap;

use thiserror::Error;

use super::ToolchainProfile;

/// Environment variables set by Visual Studio developer shells.
pub const VISUAL_STUDIO_SIGNALS: [&str; 2] = ["VisualStudioVersion", "VSINSTALLDIR"];

/// A snapshot of environment indicators consulted by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSignals {
    values: BTreeMap<String, String>,
}

impl EnvSignals {
    /// Create an empty signal set.
    pub fn new() -> Self {
        EnvSignals::default()
    }

    /// Set a signal value.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Snapshot the named variables from the process environment.
    pub fn from_env<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut signals = EnvSignals::new();
        for name in names {
            if let Ok(value) = std::env::var(name) {
                signals.values.insert(name.to_string(), value);
            }
        }
        signals
    }

    /// Raw value of a signal.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether a signal is present with a truthy value.
    ///
    /// Empty strings and `0`/`false`/`no`/`off` count as inactive.
    pub fn is_active(&self, name: &str) -> bool {
        match self.get(name) {
            Some(value) => {
                let value = value.trim().to_ascii_lowercase();
                !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
            }
            None => false,
        }
    }
}

/// A resolver rule: any active signal selects the profile.
#[derive(Debug, Clone)]
pub struct SignalRule {
    /// Signal names; the rule matches when any of them is active
    pub signals: Vec<String>,
    /// Profile selected on match
    pub profile: ToolchainProfile,
}

impl SignalRule {
    /// Check whether this rule matches.
    pub fn matches(&self, env: &EnvSignals) -> bool {
        self.signals.iter().any(|s| env.is_active(s))
    }
}

/// No rule matched and no default profile is configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no toolchain signal matched ({checked}) and no default toolchain is configured")]
pub struct UnresolvedToolchain {
    /// Signals that were checked, comma separated
    pub checked: String,
}

/// Picks a toolchain profile from environment signals.
///
/// Rules are checked in the order they were added; first match wins.
#[derive(Debug, Clone, Default)]
pub struct ToolchainResolver {
    rules: Vec<SignalRule>,
    default: Option<ToolchainProfile>,
}

impl ToolchainResolver {
    /// Create a resolver with no rules and no default.
    pub fn new() -> Self {
        ToolchainResolver::default()
    }

    /// Visual C++ inside a Visual Studio shell, GCC everywhere else.
    pub fn standard() -> Self {
        ToolchainResolver::new()
            .with_rule(VISUAL_STUDIO_SIGNALS, ToolchainProfile::msvc())
            .with_default(ToolchainProfile::gcc())
    }

    /// Append a rule with lower priority than the existing ones.
    pub fn with_rule<'a>(
        mut self,
        signals: impl IntoIterator<Item = &'a str>,
        profile: ToolchainProfile,
    ) -> Self {
        self.rules.push(SignalRule {
            signals: signals.into_iter().map(str::to_string).collect(),
            profile,
        });
        self
    }

    /// Set the fallback profile.
    pub fn with_default(mut self, profile: ToolchainProfile) -> Self {
        self.default = Some(profile);
        self
    }

    /// Remove the fallback profile.
    pub fn without_default(mut self) -> Self {
        self.default = None;
        self
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[SignalRule] {
        &self.rules
    }

    /// The fallback profile.
    pub fn default_profile(&self) -> Option<&ToolchainProfile> {
        self.default.as_ref()
    }

    /// Resolve a profile. Pure function of the rules and `env`.
    pub fn resolve(&self, env: &EnvSignals) -> Result<&ToolchainProfile, UnresolvedToolchain> {
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(env)) {
            tracing::debug!("toolchain signal matched, using {}", rule.profile);
            return Ok(&rule.profile);
        }

        self.default.as_ref().ok_or_else(|| UnresolvedToolchain {
            checked: self
                .rules
                .iter()
                .flat_map(|r| r.signals.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Every signal name the rules consult, for [`EnvSignals::from_env`].
    pub fn signal_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.rules.iter().flat_map(|r| r.signals.iter()) {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }
        names
    }
}
