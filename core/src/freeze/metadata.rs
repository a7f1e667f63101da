//! Context threaded through freezing

use crate::errors::{ErrorBuilder, ErrorCode, TextLocation};
use crate::steps::ParameterDef;
use crate::types::{TypeReference, TypeResolver, VariableName};

/// The step and parameter a node is being frozen for, and the type that
/// parameter expects
#[derive(Debug, Clone, PartialEq)]
pub struct CallerMetadata {
    pub step_name: String,
    pub parameter: String,
    pub expected_type: TypeReference,
}

impl CallerMetadata {
    pub fn new(step_name: &str, parameter: &str, expected_type: TypeReference) -> Self {
        Self {
            step_name: step_name.to_string(),
            parameter: parameter.to_string(),
            expected_type,
        }
    }

    /// The root of a tree: anything goes
    pub fn top_level() -> Self {
        Self::new("Root", "Step", TypeReference::Any)
    }

    pub fn for_parameter(step_name: &str, parameter: &ParameterDef) -> Self {
        Self::new(step_name, &parameter.name, parameter.declared_type())
    }

    pub fn with_expected(&self, expected_type: TypeReference) -> Self {
        Self {
            expected_type,
            ..self.clone()
        }
    }

    /// `WrongType` unless the expected type allows `actual`
    pub fn check_allows(
        &self,
        actual: &TypeReference,
        resolver: &TypeResolver,
    ) -> Result<(), ErrorBuilder> {
        if self.expected_type.allows(actual, resolver) {
            Ok(())
        } else {
            Err(self.wrong_type(actual.to_string()))
        }
    }

    pub fn wrong_type(&self, actual: impl Into<String>) -> ErrorBuilder {
        ErrorCode::WrongType {
            step: self.step_name.clone(),
            parameter: self.parameter.clone(),
            expected: self.expected_type.to_string(),
            actual: actual.into(),
        }
        .into()
    }
}

/// One occurrence of a variable in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct UsedVariable {
    pub name: VariableName,
    pub type_reference: TypeReference,
    pub was_set: bool,
    pub location: Option<TextLocation>,
}

impl UsedVariable {
    pub fn read(name: VariableName, location: Option<TextLocation>) -> Self {
        Self {
            name,
            type_reference: TypeReference::Any,
            was_set: false,
            location,
        }
    }

    pub fn write(
        name: VariableName,
        type_reference: TypeReference,
        location: Option<TextLocation>,
    ) -> Self {
        Self {
            name,
            type_reference,
            was_set: true,
            location,
        }
    }
}
