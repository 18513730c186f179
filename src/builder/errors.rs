//! Composition error types and diagnostics.

use serde::Serialize;
use thiserror::Error;

use crate::core::settings::Role;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error while composing the build plan record of one target.
///
/// Every variant names the offending target and the field or role involved.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ComposeError {
    #[error("target `{target}`: no toolchain could be resolved: {reason}")]
    UnresolvedToolchain { target: String, reason: String },

    #[error("target `{target}`: {role} template references `%{{{placeholder}}}` which has no value")]
    TemplateSubstitution {
        target: String,
        role: Role,
        placeholder: String,
    },

    #[error("target `{target}`: module `{name}` is declared from two origins ({first} and {second})")]
    DuplicateModuleName {
        target: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("target `{target}`: {role} is derived from {from}, which is not configured")]
    UnknownRoleDerivation {
        target: String,
        role: Role,
        from: Role,
    },

    #[error("target `{target}`: unknown gembox `{gembox}`")]
    UnknownGembox { target: String, gembox: String },

    #[error("target `{target}`: role {role} is not configured")]
    MissingRole { target: String, role: Role },
}

impl ComposeError {
    /// Name of the target this error belongs to.
    pub fn target(&self) -> &str {
        match self {
            ComposeError::UnresolvedToolchain { target, .. }
            | ComposeError::TemplateSubstitution { target, .. }
            | ComposeError::DuplicateModuleName { target, .. }
            | ComposeError::UnknownRoleDerivation { target, .. }
            | ComposeError::UnknownGembox { target, .. }
            | ComposeError::MissingRole { target, .. } => target,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ComposeError::UnresolvedToolchain { target, reason } => {
                Diagnostic::error(format!("no toolchain for target `{}`", target))
                    .with_context(reason.clone())
                    .with_suggestion(suggestions::PIN_TOOLCHAIN)
                    .with_suggestion("Configure a default toolchain for the resolver")
            }

            ComposeError::TemplateSubstitution {
                target,
                role,
                placeholder,
            } => Diagnostic::error(format!(
                "unresolved placeholder `%{{{}}}` in {} template of `{}`",
                placeholder, role, target
            ))
            .with_context(format!(
                "{} templates may use: {}",
                role,
                role.placeholders()
                    .iter()
                    .map(|p| format!("%{{{}}}", p))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .with_suggestion("Fix the placeholder name or supply a value for it"),

            ComposeError::DuplicateModuleName {
                target,
                name,
                first,
                second,
            } => Diagnostic::error(format!(
                "module `{}` is declared twice in target `{}`",
                name, target
            ))
            .with_context(format!("first from: {}", first))
            .with_context(format!("then from: {}", second))
            .with_suggestion(format!("Keep only one declaration of `{}`", name))
            .with_suggestion(suggestions::EXCLUDE_MODULE),

            ComposeError::UnknownRoleDerivation { target, role, from } => Diagnostic::error(
                format!("{} in `{}` derives from unconfigured role {}", role, target, from),
            )
            .with_suggestion(format!("Configure {} before deriving {} from it", from, role)),

            ComposeError::UnknownGembox { target, gembox } => {
                Diagnostic::error(format!("target `{}` uses unknown gembox `{}`", target, gembox))
                    .with_suggestion(suggestions::REGISTER_GEMBOX)
            }

            ComposeError::MissingRole { target, role } => {
                Diagnostic::error(format!("target `{}` has no {} settings", target, role))
            }
        }
    }
}

/// Composition failed for at least one target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} target(s) failed to compose:\n{}", .failures.len(), render_failures(.failures))]
pub struct PlanError {
    /// One error per failing target, in registration order
    pub failures: Vec<ComposeError>,
}

impl PlanError {
    /// Diagnostics for every failure.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.failures.iter().map(ComposeError::to_diagnostic).collect()
    }
}

fn render_failures(failures: &[ComposeError]) -> String {
    failures
        .iter()
        .map(|e| format!("  {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
