//! Entities

use std::sync::Arc;

use super::{entity, string, TypeReference};
use crate::steps::{OutputRule, ParameterDef, StepDefinition, StepFactory};
use crate::types::{Entity, Value};

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![
        Arc::new(
            StepDefinition::new("EntityCombine", OutputRule::Fixed(entity()), |step, state, cancel| {
                let mut combined = Entity::new();
                for term in step.list("Terms", state, cancel)? {
                    combined = combined.combine(term.as_entity().map_err(|e| step.fail(e))?);
                }
                Ok(Value::Entity(combined))
            })
            .description("Merge entities; later properties win")
            .parameter(ParameterDef::list("Terms", entity())),
        ),
        Arc::new(
            StepDefinition::new("EntityGetValue", OutputRule::Fixed(TypeReference::Any), |step, state, cancel| {
                let value = step.value("Entity", state, cancel)?;
                let entity = value.as_entity().map_err(|e| step.fail(e))?;
                let property = step.value("Property", state, cancel)?;
                let property = property.as_str().map_err(|e| step.fail(e))?;
                Ok(entity.get(property).cloned().unwrap_or(Value::Unit))
            })
            .description("A property of an entity, or Unit when it is missing")
            .parameter(ParameterDef::scalar("Entity", entity()))
            .parameter(ParameterDef::scalar("Property", string())),
        ),
    ]
}
