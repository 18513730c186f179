//! Core data structures for Berth.
//!
//! This module contains the configuration model:
//! - Per-role settings and option templates
//! - Targets, feature toggles and module references
//! - The registry and the Berth.toml manifest that fills it

pub mod manifest;
pub mod module_ref;
pub mod registry;
pub mod settings;
pub mod target;
pub mod template;

pub use manifest::{Manifest, ManifestError, MANIFEST_NAME};
pub use module_ref::{Gembox, GitReference, ModuleOrigin, ModuleRef, ResolvedModule};
pub use registry::{Registry, RegistryError};
pub use settings::{Role, Settings};
pub use target::{FeatureToggles, Target, TargetKind};
pub use template::{OptionTemplate, TemplateError};
