//! Sequencing, branching, logging and assertions

use std::sync::Arc;
use tracing::info;

use super::{boolean, TypeReference};
use crate::errors::ErrorCode;
use crate::steps::{OutputRule, ParameterDef, StepDefinition, StepFactory};
use crate::types::{SerializeMode, Value};

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![
        Arc::new(
            StepDefinition::new("Sequence", OutputRule::SameAsOrUnit("FinalStep".into()), |step, state, cancel| {
                if step.is_supplied("InitialSteps") {
                    step.list("InitialSteps", state, cancel)?;
                }
                Ok(step
                    .optional_value("FinalStep", state, cancel)?
                    .unwrap_or(Value::Unit))
            })
            .description("Run steps in order; the result is that of the final step")
            .parameter(ParameterDef::list("InitialSteps", TypeReference::Any).alias("Steps").optional())
            .parameter(ParameterDef::scalar("FinalStep", TypeReference::Any).optional()),
        ),
        Arc::new(
            StepDefinition::new("Log", OutputRule::Fixed(TypeReference::Unit), |step, state, cancel| {
                let value = step.value("Value", state, cancel)?;
                info!(target: "scl::log", "{}", value);
                Ok(Value::Unit)
            })
            .description("Write a value to the log")
            .parameter(ParameterDef::scalar("Value", TypeReference::Any))
            .impure(),
        ),
        Arc::new(
            StepDefinition::new("If", OutputRule::Fixed(TypeReference::Unit), |step, state, cancel| {
                let condition = step.value("Condition", state, cancel)?;
                if condition.as_bool().map_err(|e| step.fail(e))? {
                    step.value("Then", state, cancel)?;
                } else {
                    step.optional_value("Else", state, cancel)?;
                }
                Ok(Value::Unit)
            })
            .parameter(ParameterDef::scalar("Condition", boolean()))
            .parameter(ParameterDef::scalar("Then", TypeReference::Any))
            .parameter(ParameterDef::scalar("Else", TypeReference::Any).optional()),
        ),
        Arc::new(
            StepDefinition::new(
                "ValueIf",
                OutputRule::CommonOf("Then".into(), "Else".into()),
                |step, state, cancel| {
                    let condition = step.value("Condition", state, cancel)?;
                    let branch = if condition.as_bool().map_err(|e| step.fail(e))? {
                        "Then"
                    } else {
                        "Else"
                    };
                    let value = step.value(branch, state, cancel)?;
                    value.try_convert(&step.output_type).map_err(|e| step.fail(e))
                },
            )
            .description("One of two values depending on a condition")
            .parameter(ParameterDef::scalar("Condition", boolean()))
            .parameter(ParameterDef::scalar("Then", TypeReference::Any))
            .parameter(ParameterDef::scalar("Else", TypeReference::Any)),
        ),
        Arc::new(
            StepDefinition::new("AssertTrue", OutputRule::Fixed(TypeReference::Unit), |step, state, cancel| {
                let value = step.value("Boolean", state, cancel)?;
                if value.as_bool().map_err(|e| step.fail(e))? {
                    return Ok(Value::Unit);
                }
                let checked = step
                    .argument("Boolean")
                    .and_then(|a| a.children().first().map(|s| s.serialize(SerializeMode::Source)))
                    .unwrap_or_default();
                Err(step.fail(ErrorCode::AssertionFailed(checked)))
            })
            .parameter(ParameterDef::scalar("Boolean", boolean())),
        ),
    ]
}
