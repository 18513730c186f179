//! Build plan composition.
//!
//! This module selects toolchains and composes targets into build plan
//! records for an external executor.

pub mod errors;
pub mod plan;
pub mod toolchain;

pub use errors::{ComposeError, PlanError};
pub use plan::{ArtifactSet, BuildPlanRecord, Composer, PlanOutcome, TargetOutcome, TestArtifact};
pub use toolchain::{
    CommandSpec, EnvSignals, ToolchainFamily, ToolchainProfile, ToolchainResolver,
    UnresolvedToolchain,
};
