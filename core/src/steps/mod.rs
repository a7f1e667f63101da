//! Frozen, executable steps
//!
//! Freezing turns the untyped AST into a tree of `Step` trait objects. A
//! frozen tree is fully type-checked: running it only needs the requirement
//! check done by `runtime::verify`.
//!
//! - `CompoundStep` - an instance of a registered step kind with its bound arguments
//! - `ConstantStep` - a literal, enum value or folded subtree
//! - `CreateEntityStep` - an entity built from named property steps

pub mod builtin;
pub mod factory;
pub mod requirement;
pub mod store;

pub use factory::{
    EnumDefinition, OutputRule, ParameterDef, ParameterKind, ParameterTable, StepDefinition,
    StepFactory, StepRunner, VariableUsage,
};
pub use requirement::{Requirement, StepConfiguration};
pub use store::{Connector, CoreConnector, StepFactoryStore};

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::{Error, ErrorBuilder, ErrorCode, ErrorLocation, TextLocation};
use crate::runtime::{ScopedState, StateMonad};
use crate::types::{ConcreteType, Entity, SerializeMode, TypeReference, Value, VariableName};

/* ===================== Step Trait ===================== */

/// A frozen, executable node
pub trait Step: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn output_type(&self) -> &ConcreteType;

    fn text_location(&self) -> Option<&TextLocation>;

    /// Execute this step. The first failing child aborts the run.
    fn run(&self, state: &mut dyn StateMonad, cancel: &CancellationToken) -> Result<Value, Error>;

    fn children(&self) -> Vec<&dyn Step> {
        Vec::new()
    }

    /// Declared requirements, including those added by configuration
    fn requirements(&self) -> Vec<Requirement> {
        Vec::new()
    }

    /// The value of this step if it is known without running anything
    fn constant_value(&self) -> Option<&Value> {
        None
    }

    fn configuration(&self) -> Option<&StepConfiguration> {
        None
    }

    fn serialize(&self, mode: SerializeMode) -> String;

    /// Serialized form when used as an argument of another step
    fn serialize_nested(&self, mode: SerializeMode) -> String {
        self.serialize(mode)
    }

    fn error_location(&self) -> ErrorLocation {
        ErrorLocation::new(self.name(), self.text_location().cloned())
    }
}

/* ===================== Arguments ===================== */

/// A lambda: a body run once per input with `variable` bound to the input
#[derive(Debug)]
pub struct LambdaFunction {
    pub variable: VariableName,
    pub body: Box<dyn Step>,
}

impl LambdaFunction {
    /// Run the body in a new scope where the lambda variable holds `input`.
    /// Variables created by the body are disposed when the scope ends.
    pub fn invoke(
        &self,
        state: &mut dyn StateMonad,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        let mut scope = ScopedState::new(state, vec![(self.variable.clone(), input)]);
        self.body.run(&mut scope, cancel)
    }

    fn serialize(&self, mode: SerializeMode) -> String {
        format!(
            "({} => {})",
            self.variable.serialize(),
            self.body.serialize_nested(mode)
        )
    }
}

/// A bound argument of a compound step
#[derive(Debug)]
pub enum FrozenArgument {
    Step(Box<dyn Step>),
    StepList(Vec<Box<dyn Step>>),
    Lambda(LambdaFunction),
    VariableName(VariableName),
}

impl FrozenArgument {
    /// The argument's type as seen by output rules
    pub fn type_reference(&self) -> TypeReference {
        match self {
            FrozenArgument::Step(step) => step.output_type().to_reference(),
            FrozenArgument::StepList(steps) => {
                if steps.is_empty() {
                    TypeReference::array(TypeReference::Any)
                } else {
                    TypeReference::array(TypeReference::multiple(
                        steps.iter().map(|s| s.output_type().to_reference()),
                    ))
                }
            }
            FrozenArgument::Lambda(lambda) => lambda.body.output_type().to_reference(),
            FrozenArgument::VariableName(name) => TypeReference::Variable(name.clone()),
        }
    }

    pub fn children(&self) -> Vec<&dyn Step> {
        match self {
            FrozenArgument::Step(step) => vec![step.as_ref()],
            FrozenArgument::StepList(steps) => steps.iter().map(|s| s.as_ref()).collect(),
            FrozenArgument::Lambda(lambda) => vec![lambda.body.as_ref()],
            FrozenArgument::VariableName(_) => Vec::new(),
        }
    }

    /// Constant value of a scalar or list argument
    pub fn constant_value(&self) -> Option<Value> {
        match self {
            FrozenArgument::Step(step) => step.constant_value().cloned(),
            FrozenArgument::StepList(steps) => steps
                .iter()
                .map(|s| s.constant_value().cloned())
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            FrozenArgument::Lambda(_) | FrozenArgument::VariableName(_) => None,
        }
    }

    fn serialize(&self, mode: SerializeMode) -> String {
        match self {
            FrozenArgument::Step(step) => step.serialize_nested(mode),
            FrozenArgument::StepList(steps) => {
                let items: Vec<String> = steps.iter().map(|s| s.serialize_nested(mode)).collect();
                format!("[{}]", items.join(", "))
            }
            FrozenArgument::Lambda(lambda) => lambda.serialize(mode),
            FrozenArgument::VariableName(name) => name.serialize(),
        }
    }
}

/* ===================== Compound Steps ===================== */

/// An instance of a registered step kind
#[derive(Debug)]
pub struct CompoundStep {
    pub factory: Arc<dyn StepFactory>,
    /// Supplied arguments in parameter-table order
    pub arguments: Vec<(String, FrozenArgument)>,
    pub output_type: ConcreteType,
    pub location: Option<TextLocation>,
    pub configuration: Option<StepConfiguration>,
}

impl CompoundStep {
    pub fn argument(&self, name: &str) -> Option<&FrozenArgument> {
        self.arguments
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, a)| a)
    }

    pub fn is_supplied(&self, name: &str) -> bool {
        self.argument(name).is_some()
    }

    /// Locate an error at this step
    pub fn fail(&self, builder: impl Into<ErrorBuilder>) -> Error {
        builder.into().into_error(self.error_location())
    }

    fn missing(&self, parameter: &str) -> Error {
        self.fail(ErrorCode::MissingParameter {
            step: self.name().to_string(),
            parameter: parameter.to_string(),
        })
    }

    /// Run a scalar argument
    pub fn value(
        &self,
        name: &str,
        state: &mut dyn StateMonad,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        self.optional_value(name, state, cancel)?
            .ok_or_else(|| self.missing(name))
    }

    /// Run a scalar argument if it was supplied
    pub fn optional_value(
        &self,
        name: &str,
        state: &mut dyn StateMonad,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, Error> {
        match self.argument(name) {
            None => Ok(None),
            Some(FrozenArgument::Step(step)) => step.run(state, cancel).map(Some),
            Some(FrozenArgument::StepList(_)) => {
                self.list(name, state, cancel).map(|items| Some(Value::Array(items)))
            }
            Some(_) => Err(self.fail(ErrorCode::WrongType {
                step: self.name().to_string(),
                parameter: name.to_string(),
                expected: "a step".to_string(),
                actual: "a lambda or variable".to_string(),
            })),
        }
    }

    /// Run a list argument, element by element in order
    pub fn list(
        &self,
        name: &str,
        state: &mut dyn StateMonad,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, Error> {
        match self.argument(name) {
            Some(FrozenArgument::StepList(steps)) => {
                let mut items = Vec::with_capacity(steps.len());
                for step in steps {
                    items.push(step.run(state, cancel)?);
                }
                Ok(items)
            }
            Some(FrozenArgument::Step(step)) => step
                .run(state, cancel)?
                .into_array()
                .map_err(|e| self.fail(e)),
            Some(_) => Err(self.fail(ErrorCode::WrongType {
                step: self.name().to_string(),
                parameter: name.to_string(),
                expected: "a list".to_string(),
                actual: "a lambda or variable".to_string(),
            })),
            None => Err(self.missing(name)),
        }
    }

    pub fn lambda(&self, name: &str) -> Result<&LambdaFunction, Error> {
        match self.argument(name) {
            Some(FrozenArgument::Lambda(lambda)) => Ok(lambda),
            _ => Err(self.missing(name)),
        }
    }

    pub fn variable_name(&self, name: &str) -> Result<&VariableName, Error> {
        match self.argument(name) {
            Some(FrozenArgument::VariableName(variable)) => Ok(variable),
            _ => Err(self.missing(name)),
        }
    }
}

impl Step for CompoundStep {
    fn name(&self) -> &str {
        self.factory.name()
    }

    fn output_type(&self) -> &ConcreteType {
        &self.output_type
    }

    fn text_location(&self) -> Option<&TextLocation> {
        self.location.as_ref()
    }

    fn run(&self, state: &mut dyn StateMonad, cancel: &CancellationToken) -> Result<Value, Error> {
        if cancel.is_cancelled() {
            return Err(self.fail(ErrorCode::Cancelled));
        }
        trace!(step = %self.name(), "running step");
        self.factory
            .run(self, state, cancel)
            .map_err(|e| e.with_default_location(&self.error_location()))
    }

    fn children(&self) -> Vec<&dyn Step> {
        self.arguments
            .iter()
            .flat_map(|(_, argument)| argument.children())
            .collect()
    }

    fn requirements(&self) -> Vec<Requirement> {
        let mut requirements = self.factory.requirements().to_vec();
        if let Some(configuration) = &self.configuration {
            requirements.extend(configuration.additional_requirements.iter().cloned());
        }
        requirements
    }

    fn configuration(&self) -> Option<&StepConfiguration> {
        self.configuration.as_ref()
    }

    fn serialize(&self, mode: SerializeMode) -> String {
        if self.name().eq_ignore_ascii_case(builtin::GET_VARIABLE) {
            if let Ok(name) = self.variable_name("Variable") {
                return name.serialize();
            }
        }

        let mut text = self.name().to_string();
        for (name, argument) in &self.arguments {
            text.push_str(&format!(" {}: {}", name, argument.serialize(mode)));
        }
        text
    }

    fn serialize_nested(&self, mode: SerializeMode) -> String {
        let text = self.serialize(mode);
        if self.arguments.is_empty() || text.starts_with('<') {
            text
        } else {
            format!("({})", text)
        }
    }
}

/* ===================== Constants ===================== */

/// A value known when freezing
#[derive(Debug)]
pub struct ConstantStep {
    pub value: Value,
    pub output_type: ConcreteType,
    pub location: Option<TextLocation>,
}

impl ConstantStep {
    pub fn new(value: Value, location: Option<TextLocation>) -> Self {
        Self {
            output_type: value.value_type(),
            value,
            location,
        }
    }

    /// A constant whose static type is wider than its value's own type
    pub fn typed(value: Value, output_type: ConcreteType, location: Option<TextLocation>) -> Self {
        Self {
            value,
            output_type,
            location,
        }
    }
}

impl Step for ConstantStep {
    fn name(&self) -> &str {
        "Constant"
    }

    fn output_type(&self) -> &ConcreteType {
        &self.output_type
    }

    fn text_location(&self) -> Option<&TextLocation> {
        self.location.as_ref()
    }

    fn run(&self, _state: &mut dyn StateMonad, _cancel: &CancellationToken) -> Result<Value, Error> {
        Ok(self.value.clone())
    }

    fn constant_value(&self) -> Option<&Value> {
        Some(&self.value)
    }

    fn serialize(&self, mode: SerializeMode) -> String {
        self.value.serialize(mode)
    }
}

/* ===================== Entities ===================== */

/// Builds an entity from named property steps
#[derive(Debug)]
pub struct CreateEntityStep {
    pub properties: Vec<(String, Box<dyn Step>)>,
    pub location: Option<TextLocation>,
    output_type: ConcreteType,
}

impl CreateEntityStep {
    pub fn new(properties: Vec<(String, Box<dyn Step>)>, location: Option<TextLocation>) -> Self {
        Self {
            properties,
            location,
            output_type: ConcreteType::Actual(crate::types::ActualKind::Entity),
        }
    }
}

impl Step for CreateEntityStep {
    fn name(&self) -> &str {
        "CreateEntity"
    }

    fn output_type(&self) -> &ConcreteType {
        &self.output_type
    }

    fn text_location(&self) -> Option<&TextLocation> {
        self.location.as_ref()
    }

    fn run(&self, state: &mut dyn StateMonad, cancel: &CancellationToken) -> Result<Value, Error> {
        let mut entity = Entity::new();
        for (key, step) in &self.properties {
            entity.set(key.clone(), step.run(state, cancel)?);
        }
        Ok(Value::Entity(entity))
    }

    fn children(&self) -> Vec<&dyn Step> {
        self.properties.iter().map(|(_, s)| s.as_ref()).collect()
    }

    fn serialize(&self, mode: SerializeMode) -> String {
        let parts: Vec<String> = self
            .properties
            .iter()
            .map(|(k, s)| format!("'{}': {}", k, s.serialize_nested(mode)))
            .collect();
        format!("({})", parts.join(" "))
    }
}

#[cfg(test)]
mod tests;
