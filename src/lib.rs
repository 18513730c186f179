//! Berth - a declarative build-configuration engine for C/C++ targets
//!
//! This crate turns a set of named build targets into build plan records:
//! the resolved toolchain, per-role compiler/linker/archiver settings,
//! feature toggles and the ordered module set of every target. Running the
//! tools and fetching remote modules is left to external collaborators.

pub mod builder;
pub mod core;
pub mod resolver;
pub mod sources;
pub mod util;

pub use crate::builder::{
    BuildPlanRecord, ComposeError, Composer, EnvSignals, PlanError, PlanOutcome, ToolchainProfile,
    ToolchainResolver,
};
pub use crate::core::{Manifest, ModuleRef, Registry, Role, Settings, Target};
