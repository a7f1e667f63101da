//! Arrays and iteration

use std::sync::Arc;
use tracing::trace;

use super::{any_array, integer, TypeReference, ARRAY_NEW};
use crate::errors::ErrorCode;
use crate::steps::{OutputRule, ParameterDef, StepDefinition, StepFactory};
use crate::types::Value;

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![
        Arc::new(
            StepDefinition::new(ARRAY_NEW, OutputRule::SameAs("Elements".into()), |step, state, cancel| {
                let elements = step.list("Elements", state, cancel)?;
                Value::Array(elements)
                    .try_convert(&step.output_type)
                    .map_err(|e| step.fail(e))
            })
            .description("Create an array; its member type is inferred from the elements")
            .parameter(ParameterDef::list("Elements", TypeReference::Any)),
        ),
        Arc::new(
            StepDefinition::new("ArrayConcat", OutputRule::MemberOf("Arrays".into()), |step, state, cancel| {
                let mut combined = Vec::new();
                for array in step.list("Arrays", state, cancel)? {
                    combined.extend(array.into_array().map_err(|e| step.fail(e))?);
                }
                Value::Array(combined)
                    .try_convert(&step.output_type)
                    .map_err(|e| step.fail(e))
            })
            .description("Concatenate arrays")
            .parameter(ParameterDef::list("Arrays", any_array())),
        ),
        Arc::new(
            StepDefinition::new("ArrayLength", OutputRule::Fixed(integer()), |step, state, cancel| {
                let array = step.value("Array", state, cancel)?;
                let items = array.into_array().map_err(|e| step.fail(e))?;
                Ok(Value::Int(items.len() as i64))
            })
            .parameter(ParameterDef::scalar("Array", any_array())),
        ),
        Arc::new(
            StepDefinition::new("ElementAtIndex", OutputRule::MemberOf("Array".into()), |step, state, cancel| {
                let array = step.value("Array", state, cancel)?;
                let items = array.into_array().map_err(|e| step.fail(e))?;
                let index = step.value("Index", state, cancel)?;
                let index = index.as_int().map_err(|e| step.fail(e))?;

                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .ok_or_else(|| {
                        step.fail(ErrorCode::IndexOutOfBounds {
                            index,
                            length: items.len(),
                        })
                    })
            })
            .description("The element at a zero-based index")
            .parameter(ParameterDef::scalar("Array", any_array()))
            .parameter(ParameterDef::scalar("Index", integer())),
        ),
        Arc::new(
            StepDefinition::new("ForEach", OutputRule::Fixed(TypeReference::Unit), |step, state, cancel| {
                let items = step.value("Array", state, cancel)?.into_array().map_err(|e| step.fail(e))?;
                let action = step.lambda("Action")?;
                for (index, item) in items.into_iter().enumerate() {
                    if cancel.is_cancelled() {
                        return Err(step.fail(ErrorCode::Cancelled));
                    }
                    trace!(index, "for each iteration");
                    action.invoke(state, item, cancel)?;
                }
                Ok(Value::Unit)
            })
            .description("Run an action once per element")
            .parameter(ParameterDef::scalar("Array", any_array()))
            .parameter(ParameterDef::lambda("Action", TypeReference::Any, "Array"))
            .impure(),
        ),
        Arc::new(
            StepDefinition::new("Map", OutputRule::ArrayOfLambda("Function".into()), |step, state, cancel| {
                let items = step.value("Array", state, cancel)?.into_array().map_err(|e| step.fail(e))?;
                let function = step.lambda("Function")?;
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    if cancel.is_cancelled() {
                        return Err(step.fail(ErrorCode::Cancelled));
                    }
                    mapped.push(function.invoke(state, item, cancel)?);
                }
                Ok(Value::Array(mapped))
            })
            .description("Apply a function to every element")
            .parameter(ParameterDef::scalar("Array", any_array()))
            .parameter(ParameterDef::lambda("Function", TypeReference::Any, "Array")),
        ),
    ]
}
