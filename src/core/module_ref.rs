//! Module references - WHAT optional feature modules a target pulls in.
//!
//! A module is either provided by the core distribution (identified by
//! name only) or lives in a remote git repository (locator + revision).
//! Whether a reference takes part in the build is an explicit `included`
//! flag on the reference itself.

use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Git reference specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitReference {
    /// Default branch (usually main/master)
    #[default]
    DefaultBranch,
    /// Specific branch
    Branch(String),
    /// Specific tag
    Tag(String),
    /// Specific revision (commit hash)
    Rev(String),
}

impl fmt::Display for GitReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitReference::DefaultBranch => write!(f, "default branch"),
            GitReference::Branch(b) => write!(f, "branch={}", b),
            GitReference::Tag(t) => write!(f, "tag={}", t),
            GitReference::Rev(r) => write!(f, "rev={}", r),
        }
    }
}

/// Where a module comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum ModuleOrigin {
    /// Shipped with the core distribution; no network access needed
    Core,
    /// Remote git repository that must be fetched before building
    Remote {
        /// Repository URL
        locator: String,
        /// Branch, tag or revision to check out
        reference: GitReference,
    },
}

impl ModuleOrigin {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ModuleOrigin::Core => "core".to_string(),
            ModuleOrigin::Remote { locator, reference } => {
                format!("{} ({})", locator, reference)
            }
        }
    }

    /// Check if this is a remote origin.
    pub fn is_remote(&self) -> bool {
        matches!(self, ModuleOrigin::Remote { .. })
    }
}

/// A declared module dependency of a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    name: String,
    origin: ModuleOrigin,
    included: bool,
}

impl ModuleRef {
    /// Reference a core module by name.
    pub fn core(name: impl Into<String>) -> Self {
        ModuleRef {
            name: name.into(),
            origin: ModuleOrigin::Core,
            included: true,
        }
    }

    /// Reference a remote module by git URL.
    pub fn git(locator: &str) -> Result<Self> {
        let url = Url::parse(locator)
            .map_err(|e| anyhow::anyhow!("invalid module locator `{}`: {}", locator, e))?;
        let name = repo_name(&url)?;

        Ok(ModuleRef {
            name,
            origin: ModuleOrigin::Remote {
                locator: url.to_string(),
                reference: GitReference::DefaultBranch,
            },
            included: true,
        })
    }

    /// Reference a GitHub repository by `owner/repo` shorthand.
    pub fn github(repo: &str) -> Result<Self> {
        Self::git(&shorthand_url("github.com", repo)?)
    }

    /// Reference a Bitbucket repository by `owner/repo` shorthand.
    pub fn bitbucket(repo: &str) -> Result<Self> {
        Self::git(&shorthand_url("bitbucket.org", repo)?)
    }

    /// Pin a remote reference to a branch. No effect on core modules.
    pub fn branch(self, branch: impl Into<String>) -> Self {
        self.with_reference(GitReference::Branch(branch.into()))
    }

    /// Pin a remote reference to a tag. No effect on core modules.
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.with_reference(GitReference::Tag(tag.into()))
    }

    /// Pin a remote reference to a revision. No effect on core modules.
    pub fn rev(self, rev: impl Into<String>) -> Self {
        self.with_reference(GitReference::Rev(rev.into()))
    }

    fn with_reference(mut self, new: GitReference) -> Self {
        if let ModuleOrigin::Remote { reference, .. } = &mut self.origin {
            *reference = new;
        }
        self
    }

    /// Set whether this reference takes part in the build.
    pub fn included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    /// Mark this reference as excluded.
    pub fn excluded(self) -> Self {
        self.included(false)
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module origin.
    pub fn origin(&self) -> &ModuleOrigin {
        &self.origin
    }

    /// Check if this reference is included.
    pub fn is_included(&self) -> bool {
        self.included
    }
}

fn shorthand_url(host: &str, repo: &str) -> Result<String> {
    let repo = repo.trim_matches('/');
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Ok(format!("https://{}/{}/{}.git", host, owner, name.trim_end_matches(".git")))
        }
        _ => bail!("expected `owner/repo`, found `{}`", repo),
    }
}

/// Module name from the last path segment of a repository URL.
fn repo_name(url: &Url) -> Result<String> {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| s.trim_end_matches(".git"))
        .unwrap_or_default();

    if segment.is_empty() {
        bail!("module locator `{}` has no repository name", url);
    }
    Ok(segment.to_string())
}

/// A named bundle of module references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gembox {
    name: String,
    modules: Vec<ModuleRef>,
}

impl Gembox {
    /// Create an empty gembox.
    pub fn new(name: impl Into<String>) -> Self {
        Gembox {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    /// Add a module reference.
    pub fn gem(mut self, module: ModuleRef) -> Self {
        self.modules.push(module);
        self
    }

    /// Add several core modules by name.
    pub fn core_gems(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.modules.extend(names.into_iter().map(ModuleRef::core));
        self
    }

    /// Gembox name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Modules in declaration order.
    pub fn modules(&self) -> &[ModuleRef] {
        &self.modules
    }
}

/// One entry in a target's dependency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// A single module reference
    Module(ModuleRef),
    /// A gembox, expanded in place during composition
    Gembox(String),
}

/// A module in a finalized build plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedModule {
    /// Module name
    pub name: String,
    /// Where the module comes from
    #[serde(flatten)]
    pub origin: ModuleOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_module_defaults_to_included() {
        let m = ModuleRef::core("mruby-math");
        assert_eq!(m.name(), "mruby-math");
        assert!(m.is_included());
        assert_eq!(m.origin(), &ModuleOrigin::Core);
    }

    #[test]
    fn test_github_shorthand() {
        let m = ModuleRef::github("takjn/mruby-arduino")
            .unwrap()
            .branch("master");
        assert_eq!(m.name(), "mruby-arduino");
        assert_eq!(
            m.origin(),
            &ModuleOrigin::Remote {
                locator: "https://github.com/takjn/mruby-arduino.git".to_string(),
                reference: GitReference::Branch("master".to_string()),
            }
        );
    }

    #[test]
    fn test_git_locator_name_strips_suffix() {
        let m = ModuleRef::git("https://example.com/libs/mruby-hs-regexp.git/").unwrap();
        assert_eq!(m.name(), "mruby-hs-regexp");
    }

    #[test]
    fn test_invalid_shorthand() {
        assert!(ModuleRef::github("just-a-name").is_err());
        assert!(ModuleRef::github("a/b/c").is_err());
        assert!(ModuleRef::git("not a url").is_err());
    }

    #[test]
    fn test_reference_on_core_is_ignored() {
        let m = ModuleRef::core("mruby-print").rev("abc123");
        assert_eq!(m.origin(), &ModuleOrigin::Core);
    }

    #[test]
    fn test_excluded() {
        let m = ModuleRef::core("mruby-eval").excluded();
        assert!(!m.is_included());
    }
}
