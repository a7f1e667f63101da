//! The freezing pipeline
//!
//! `freeze_top_level` runs the whole pipeline on a parsed tree:
//!
//! 1. Move misplaced named arguments to the steps that declare them
//! 2. Resolve the type of every variable (`TypeResolver::try_add_type_hierarchy`)
//! 3. Bind and type-check every node, folding constants when enabled

mod ast;
mod engine;
mod metadata;
mod reorganize;

pub use ast::{
    CompoundFreezableStep, EntityProperty, FreezableStep, FreezableStepProperty, ParameterKey,
    StepProperty,
};
pub use metadata::{CallerMetadata, UsedVariable};
pub use reorganize::reorganize_named_arguments;

use tracing::debug;

use crate::config::Config;
use crate::errors::Error;
use crate::steps::{Step, StepFactoryStore};
use crate::types::TypeResolver;

/// Freeze a whole parsed tree into an executable step
pub fn freeze_top_level(
    step: &FreezableStep,
    store: &StepFactoryStore,
    config: &Config,
) -> Result<Box<dyn Step>, Error> {
    let step = reorganize_named_arguments(step, store);
    let caller = CallerMetadata::top_level();

    let mut resolver = TypeResolver::new(store).with_constant_folding(config.constant_folding);
    let passes = resolver.try_add_type_hierarchy(&step, &caller)?;
    debug!(
        passes,
        variables = resolver.dictionary().len(),
        "resolved variable types"
    );

    step.freeze(&caller, &resolver)
}

#[cfg(test)]
mod tests;
