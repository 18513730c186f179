//! User-friendly diagnostic messages.
//!
//! Every composition or manifest error can be turned into a diagnostic
//! carrying the root cause, related context and suggested fixes.

use std::fmt;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a target has no toolchain.
    pub const PIN_TOOLCHAIN: &str =
        "Pin a toolchain on the target (`toolchain = \"gcc\"` in Berth.toml)";

    /// Suggestion when a module is declared from two origins.
    pub const EXCLUDE_MODULE: &str =
        "Mark the unwanted declaration with `included = false`";

    /// Suggestion when a gembox is missing.
    pub const REGISTER_GEMBOX: &str =
        "Declare the gembox in a `[gembox.<name>]` table or register it before composing";
}

/// An error message with context lines and suggested fixes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        for ctx in &self.context {
            writeln!(f, "  -> {}", ctx)?;
        }
        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "help: consider:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }
        Ok(())
    }
}
