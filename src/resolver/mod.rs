//! Module dependency resolution.
//!
//! Turns a target's declaration list into the ordered set of modules that
//! take part in its build. There is no transitive resolution: every module
//! is a leaf declared by the configuration, so the walk is a single pass in
//! declaration order with gemboxes expanded in place.

use std::collections::HashMap;

use crate::builder::errors::ComposeError;
use crate::core::module_ref::{Declaration, ModuleRef, ResolvedModule};
use crate::core::registry::Registry;
use crate::core::target::Target;

/// Resolve the included modules of `target`, in declaration order.
///
/// Excluded references are skipped before any other check, so an excluded
/// declaration never conflicts with an included one. A name declared twice
/// from the same origin is kept once, at its first position. A name declared
/// from two different origins is a [`ComposeError::DuplicateModuleName`].
pub fn resolve_modules(
    target: &Target,
    registry: &Registry,
) -> Result<Vec<ResolvedModule>, ComposeError> {
    let mut resolved: Vec<ResolvedModule> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for declaration in target.dependencies() {
        match declaration {
            Declaration::Module(module) => {
                add_module(target, module, &mut resolved, &mut by_name)?;
            }
            Declaration::Gembox(name) => {
                let gembox =
                    registry
                        .gembox(name)
                        .ok_or_else(|| ComposeError::UnknownGembox {
                            target: target.name().to_string(),
                            gembox: name.clone(),
                        })?;

                tracing::debug!(
                    "expanding gembox `{}` ({} modules) for target `{}`",
                    name,
                    gembox.modules().len(),
                    target.name()
                );

                for module in gembox.modules() {
                    add_module(target, module, &mut resolved, &mut by_name)?;
                }
            }
        }
    }

    Ok(resolved)
}

fn add_module(
    target: &Target,
    module: &ModuleRef,
    resolved: &mut Vec<ResolvedModule>,
    by_name: &mut HashMap<String, usize>,
) -> Result<(), ComposeError> {
    if !module.is_included() {
        tracing::debug!(
            "module `{}` is excluded from target `{}`",
            module.name(),
            target.name()
        );
        return Ok(());
    }

    if let Some(&index) = by_name.get(module.name()) {
        let existing = &resolved[index];
        if &existing.origin == module.origin() {
            tracing::warn!(
                "module `{}` is declared more than once in target `{}`; keeping the first",
                module.name(),
                target.name()
            );
            return Ok(());
        }

        return Err(ComposeError::DuplicateModuleName {
            target: target.name().to_string(),
            name: module.name().to_string(),
            first: existing.origin.describe(),
            second: module.origin().describe(),
        });
    }

    by_name.insert(module.name().to_string(), resolved.len());
    resolved.push(ResolvedModule {
        name: module.name().to_string(),
        origin: module.origin().clone(),
    });
    Ok(())
}
