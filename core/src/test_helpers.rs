//! Builders shared by unit tests

use crate::config::Config;
use crate::errors::Error;
use crate::freeze::{freeze_top_level, FreezableStep, FreezableStepProperty, ParameterKey};
use crate::runtime::RootState;
use crate::steps::{Step, StepFactoryStore};
use crate::types::{Value, VariableName};
use tokio_util::sync::CancellationToken;

pub fn var(name: &str) -> VariableName {
    VariableName::new(name).expect("valid variable name")
}

pub fn step<K: Into<ParameterKey>>(
    name: &str,
    properties: impl IntoIterator<Item = (K, FreezableStepProperty)>,
) -> FreezableStep {
    FreezableStep::compound(name, properties)
}

pub fn arg(step: FreezableStep) -> FreezableStepProperty {
    FreezableStepProperty::step(step)
}

pub fn get(name: &str) -> FreezableStepProperty {
    FreezableStepProperty::variable(var(name))
}

pub fn list(steps: Vec<FreezableStep>) -> FreezableStepProperty {
    FreezableStepProperty::list(steps)
}

pub fn set(name: &str, value: FreezableStepProperty) -> FreezableStep {
    step("SetVariable", [("Variable", get(name)), ("Value", value)])
}

pub fn sequence(initial: Vec<FreezableStep>, last: FreezableStep) -> FreezableStep {
    step("Sequence", [("InitialSteps", list(initial)), ("FinalStep", arg(last))])
}

pub fn sum(terms: Vec<FreezableStep>) -> FreezableStep {
    step("Sum", [("Terms", list(terms))])
}

pub fn ints(values: &[i64]) -> Vec<FreezableStep> {
    values.iter().map(|v| FreezableStep::int(*v)).collect()
}

pub fn array(elements: Vec<FreezableStep>) -> FreezableStep {
    step("ArrayNew", [("Elements", list(elements))])
}

pub fn store() -> StepFactoryStore {
    StepFactoryStore::core().expect("core steps register")
}

pub fn freeze_with(step: &FreezableStep, constant_folding: bool) -> Result<Box<dyn Step>, Error> {
    let config = Config {
        constant_folding,
        ..Config::default()
    };
    freeze_top_level(step, &store(), &config)
}

pub fn freeze(step: &FreezableStep) -> Result<Box<dyn Step>, Error> {
    freeze_with(step, true)
}

/// Freeze without folding and run in a fresh store
pub fn run(step: &FreezableStep) -> Result<Value, Error> {
    let frozen = freeze_with(step, false)?;
    let mut state = RootState::empty();
    frozen.run(&mut state, &CancellationToken::new())
}
