//! Reading and writing variables

use std::sync::Arc;

use super::{GET_AUTOMATIC_VARIABLE, GET_VARIABLE};
use crate::errors::{Error, ErrorCode};
use crate::runtime::StateMonad;
use crate::steps::{
    CompoundStep, OutputRule, ParameterDef, StepDefinition, StepFactory, VariableUsage,
};
use crate::types::{TypeReference, Value, VariableName};

/// Read `name`, checking the value against the step's frozen type
fn read(step: &CompoundStep, state: &dyn StateMonad, name: &VariableName) -> Result<Value, Error> {
    let value = state
        .get_variable(name)
        .ok_or_else(|| step.fail(ErrorCode::MissingVariable(name.to_string())))?;

    if value.conforms_to(&step.output_type) {
        Ok(value)
    } else {
        Err(step.fail(ErrorCode::WrongVariableType {
            name: name.to_string(),
            expected: step.output_type.to_string(),
            actual: value.value_type().to_string(),
        }))
    }
}

pub(super) fn factories() -> Vec<Arc<dyn StepFactory>> {
    vec![
        Arc::new(
            StepDefinition::new("SetVariable", OutputRule::Fixed(TypeReference::Unit), |step, state, cancel| {
                let name = step.variable_name("Variable")?.clone();
                let value = step.value("Value", state, cancel)?;
                state.set_variable(name, value);
                Ok(Value::Unit)
            })
            .description("Set the value of a variable")
            .parameter(ParameterDef::variable_name("Variable"))
            .parameter(ParameterDef::scalar("Value", TypeReference::Any))
            .usage(VariableUsage::Writes {
                variable: "Variable".into(),
                value: "Value".into(),
            })
            .impure(),
        ),
        Arc::new(
            StepDefinition::new(GET_VARIABLE, OutputRule::VariableOf("Variable".into()), |step, state, _| {
                let name = step.variable_name("Variable")?;
                read(step, state, name)
            })
            .description("Get the value of a variable")
            .parameter(ParameterDef::variable_name("Variable"))
            .usage(VariableUsage::Reads("Variable".into()))
            .impure(),
        ),
        Arc::new(
            StepDefinition::new(GET_AUTOMATIC_VARIABLE, OutputRule::AutomaticVariable, |step, state, _| {
                read(step, state, &VariableName::item())
            })
            .description("Get the value of the current lambda variable")
            .usage(VariableUsage::ReadsAutomatic)
            .impure(),
        ),
    ]
}
