//! The freezable AST
//!
//! The external parser hands the engine a tree of `FreezableStep` nodes,
//! serialised as JSON with a `"t"` tag on every node:
//!
//! ```json
//! { "t": "Compound", "name": "Log", "properties": [
//!     { "key": "Value", "value": { "t": "Step", "step": { "t": "Constant", "value": { "t": "Int", "v": 1 } } } }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ErrorLocation, TextLocation};
use crate::steps::StepConfiguration;
use crate::types::{Literal, VariableName};

/* ===================== Keys ===================== */

/// How an argument names its parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterKey {
    Named(String),
    /// 1-based position
    Index(usize),
}

impl ParameterKey {
    pub fn named(name: &str) -> Self {
        ParameterKey::Named(name.to_string())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            ParameterKey::Named(name) => Some(name),
            ParameterKey::Index(_) => None,
        }
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKey::Named(name) => write!(f, "{}", name),
            ParameterKey::Index(position) => write!(f, "{}", position),
        }
    }
}

impl From<&str> for ParameterKey {
    fn from(name: &str) -> Self {
        ParameterKey::named(name)
    }
}

impl From<usize> for ParameterKey {
    fn from(position: usize) -> Self {
        ParameterKey::Index(position)
    }
}

/* ===================== Properties ===================== */

/// The value supplied for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FreezableStepProperty {
    Variable {
        name: VariableName,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
    Step {
        step: Box<FreezableStep>,
    },
    StepList {
        steps: Vec<FreezableStep>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
    /// A body with its bound variable; `<item>` when none is named
    Lambda {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable: Option<VariableName>,
        body: Box<FreezableStep>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
}

impl FreezableStepProperty {
    pub fn step(step: FreezableStep) -> Self {
        FreezableStepProperty::Step {
            step: Box::new(step),
        }
    }

    pub fn variable(name: VariableName) -> Self {
        FreezableStepProperty::Variable {
            name,
            location: None,
        }
    }

    pub fn list(steps: Vec<FreezableStep>) -> Self {
        FreezableStepProperty::StepList {
            steps,
            location: None,
        }
    }

    pub fn lambda(variable: Option<VariableName>, body: FreezableStep) -> Self {
        FreezableStepProperty::Lambda {
            variable,
            body: Box::new(body),
            location: None,
        }
    }

    pub fn location(&self) -> Option<&TextLocation> {
        match self {
            FreezableStepProperty::Variable { location, .. }
            | FreezableStepProperty::StepList { location, .. }
            | FreezableStepProperty::Lambda { location, .. } => location.as_ref(),
            FreezableStepProperty::Step { step } => step.location(),
        }
    }
}

/// A keyed argument of a compound step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProperty {
    pub key: ParameterKey,
    pub value: FreezableStepProperty,
}

impl StepProperty {
    pub fn new(key: impl Into<ParameterKey>, value: FreezableStepProperty) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// A property of a `CreateEntity` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProperty {
    pub key: String,
    pub value: FreezableStepProperty,
}

/* ===================== Nodes ===================== */

/// A use of a registered step kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundFreezableStep {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<StepProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<StepConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TextLocation>,
}

/// An AST node prior to freezing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FreezableStep {
    Compound(CompoundFreezableStep),
    Constant {
        value: Literal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
    EnumConstant {
        enum_type: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
    CreateEntity {
        properties: Vec<EntityProperty>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
    /// Alternative readings of the same syntax, tried in order
    Options {
        options: Vec<FreezableStep>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<TextLocation>,
    },
}

impl FreezableStep {
    pub fn compound<K: Into<ParameterKey>>(
        name: &str,
        properties: impl IntoIterator<Item = (K, FreezableStepProperty)>,
    ) -> Self {
        FreezableStep::Compound(CompoundFreezableStep {
            name: name.to_string(),
            properties: properties
                .into_iter()
                .map(|(k, v)| StepProperty::new(k, v))
                .collect(),
            configuration: None,
            location: None,
        })
    }

    pub fn constant(value: Literal) -> Self {
        FreezableStep::Constant {
            value,
            location: None,
        }
    }

    pub fn int(value: i64) -> Self {
        Self::constant(Literal::Int(value))
    }

    pub fn double(value: f64) -> Self {
        Self::constant(Literal::Double(value))
    }

    pub fn string(value: &str) -> Self {
        Self::constant(Literal::String(value.to_string()))
    }

    pub fn bool(value: bool) -> Self {
        Self::constant(Literal::Bool(value))
    }

    pub fn enum_constant(enum_type: &str, value: &str) -> Self {
        FreezableStep::EnumConstant {
            enum_type: enum_type.to_string(),
            value: value.to_string(),
            location: None,
        }
    }

    pub fn entity(properties: impl IntoIterator<Item = (String, FreezableStepProperty)>) -> Self {
        FreezableStep::CreateEntity {
            properties: properties
                .into_iter()
                .map(|(key, value)| EntityProperty { key, value })
                .collect(),
            location: None,
        }
    }

    pub fn options(options: Vec<FreezableStep>) -> Self {
        FreezableStep::Options {
            options,
            location: None,
        }
    }

    pub fn with_location(mut self, text_location: TextLocation) -> Self {
        match &mut self {
            FreezableStep::Compound(c) => c.location = Some(text_location),
            FreezableStep::Constant { location, .. }
            | FreezableStep::EnumConstant { location, .. }
            | FreezableStep::CreateEntity { location, .. }
            | FreezableStep::Options { location, .. } => *location = Some(text_location),
        }
        self
    }

    pub fn with_configuration(mut self, configuration: StepConfiguration) -> Self {
        if let FreezableStep::Compound(c) = &mut self {
            c.configuration = Some(configuration);
        }
        self
    }

    pub fn location(&self) -> Option<&TextLocation> {
        match self {
            FreezableStep::Compound(c) => c.location.as_ref(),
            FreezableStep::Constant { location, .. }
            | FreezableStep::EnumConstant { location, .. }
            | FreezableStep::CreateEntity { location, .. }
            | FreezableStep::Options { location, .. } => location.as_ref(),
        }
    }

    /// Name used when locating errors at this node
    pub fn step_name(&self) -> String {
        match self {
            FreezableStep::Compound(c) => c.name.clone(),
            FreezableStep::Constant { value, .. } => value.to_value().to_string(),
            FreezableStep::EnumConstant {
                enum_type, value, ..
            } => format!("{}.{}", enum_type, value),
            FreezableStep::CreateEntity { .. } => "CreateEntity".to_string(),
            FreezableStep::Options { .. } => "Options".to_string(),
        }
    }

    pub fn error_location(&self) -> ErrorLocation {
        ErrorLocation::new(self.step_name(), self.location().cloned())
    }
}
