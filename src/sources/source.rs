//! Fetch collaborator interface.
//!
//! The engine never touches the network. Remote modules in a build plan
//! are handed to a [`ModuleFetcher`] supplied by the caller, which
//! materializes them on disk before the build executor runs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::module_ref::GitReference;
use crate::util::hash::sha256_str;

/// A remote module that must be materialized before building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Module name
    pub name: String,
    /// Repository URL
    pub locator: String,
    /// Branch, tag or revision
    pub reference: GitReference,
}

impl FetchRequest {
    /// Stable directory name for this repository + reference.
    ///
    /// Two requests for the same locator and reference share a checkout.
    pub fn checkout_name(&self) -> String {
        let base = Url::parse(&self.locator)
            .map(|url| sanitize_url_for_path(&url))
            .unwrap_or_else(|_| self.name.clone());

        format!(
            "{}-{}",
            base,
            &sha256_str(&format!("{}#{:?}", self.locator, self.reference))[..8]
        )
    }
}

/// Materializes remote modules.
pub trait ModuleFetcher {
    /// Get the fetcher name for display.
    fn name(&self) -> &str;

    /// Fetch one module. Called once per distinct request.
    fn fetch(&mut self, request: &FetchRequest) -> Result<()>;
}

fn sanitize_url_for_path(url: &Url) -> String {
    let mut name = String::new();

    if let Some(host) = url.host_str() {
        name.push_str(host);
    }

    let path = url.path().trim_matches('/');
    if !path.is_empty() {
        name.push('-');
        name.push_str(&path.replace('/', "-"));
    }

    if name.ends_with(".git") {
        name.truncate(name.len() - 4);
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(reference: GitReference) -> FetchRequest {
        FetchRequest {
            name: "mruby-arduino".to_string(),
            locator: "https://github.com/takjn/mruby-arduino.git".to_string(),
            reference,
        }
    }

    #[test]
    fn test_checkout_name_is_readable() {
        let name = request(GitReference::Branch("master".to_string())).checkout_name();
        assert!(name.starts_with("github.com-takjn-mruby-arduino-"));
        assert_eq!(name.len(), "github.com-takjn-mruby-arduino-".len() + 8);
    }

    #[test]
    fn test_checkout_name_depends_on_reference() {
        let a = request(GitReference::Branch("master".to_string())).checkout_name();
        let b = request(GitReference::Tag("v1.0".to_string())).checkout_name();
        assert_ne!(a, b);
        assert_eq!(
            a,
            request(GitReference::Branch("master".to_string())).checkout_name()
        );
    }
}
