//! Shared utilities

pub mod diagnostic;
pub mod hash;

pub use diagnostic::Diagnostic;
