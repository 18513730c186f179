//! Option templates.
//!
//! Tool invocations are described by templates such as
//! `%{flags} -o %{outfile} -c %{infile}`. The engine only validates and
//! renders them; the external executor spawns the resulting command.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Error produced while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("no value supplied for placeholder `%{{{placeholder}}}`")]
    MissingValue { placeholder: String },
}

/// A command-option template with named `%{...}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionTemplate(String);

impl OptionTemplate {
    /// Wrap a template string.
    pub fn new(template: impl Into<String>) -> Self {
        OptionTemplate(template.into())
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder names in order of first appearance, without repeats.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.0) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// First placeholder that is not in `known`, if any.
    pub fn first_unknown<'a>(&'a self, known: &[&str]) -> Option<&'a str> {
        self.placeholders()
            .into_iter()
            .find(|name| !known.contains(name))
    }

    /// Substitute every placeholder from `values`.
    ///
    /// Text outside placeholders is copied verbatim, including a bare `%`.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !values.contains_key(*name))
        {
            return Err(TemplateError::MissingValue {
                placeholder: missing.to_string(),
            });
        }

        let rendered = PLACEHOLDER.replace_all(&self.0, |caps: &regex::Captures<'_>| {
            values[&caps[1]].clone()
        });
        Ok(rendered.into_owned())
    }
}

impl fmt::Display for OptionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionTemplate {
    fn from(s: &str) -> Self {
        OptionTemplate::new(s)
    }
}

impl From<String> for OptionTemplate {
    fn from(s: String) -> Self {
        OptionTemplate(s)
    }
}
