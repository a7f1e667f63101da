//! Freezing: binding AST nodes to step factories and checking types
//!
//! Three walks share the same parameter binding:
//!
//! - `get_variables_used` feeds the type resolver
//! - `output_type_reference` infers a node's type before it is frozen
//! - `freeze` builds the executable step
//!
//! Freezing accumulates errors: every argument of a step is frozen even when
//! an earlier one failed, and all failures are reported together.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ast::{CompoundFreezableStep, EntityProperty, FreezableStep, FreezableStepProperty};
use super::metadata::{CallerMetadata, UsedVariable};
use crate::errors::{
    Error, ErrorBuilder, ErrorBuilderList, ErrorCode, ErrorCollector, ErrorLocation, TextLocation,
};
use crate::runtime::RootState;
use crate::steps::builtin::{ARRAY_NEW, GET_AUTOMATIC_VARIABLE, GET_VARIABLE};
use crate::steps::{
    CompoundStep, ConstantStep, CreateEntityStep, FrozenArgument, LambdaFunction, OutputRule,
    ParameterDef, ParameterKind, Step, StepFactory, StepFactoryStore, VariableUsage,
};
use crate::types::{
    ActualKind, ConcreteType, Entity, EnumValue, Literal, TypeReference, TypeResolver, Value,
    VariableName,
};

/* ===================== Parameter Binding ===================== */

/// A compound node matched against its factory's parameter table
struct Binding<'a> {
    factory: Arc<dyn StepFactory>,
    /// Supplied arguments in table order
    arguments: Vec<(ParameterDef, &'a FreezableStepProperty)>,
}

impl<'a> Binding<'a> {
    fn argument(&self, name: &str) -> Option<&(ParameterDef, &'a FreezableStepProperty)> {
        self.arguments.iter().find(|(def, _)| def.matches_name(name))
    }
}

fn location_of(step: &CompoundFreezableStep) -> ErrorLocation {
    ErrorLocation::new(step.name.clone(), step.location.clone())
}

/// The argument's own text if it has one, else the step's location
fn argument_location(property: &FreezableStepProperty, step: &ErrorLocation) -> ErrorLocation {
    match property.location() {
        Some(text) => ErrorLocation {
            step_name: step.step_name.clone(),
            text_location: Some(text.clone()),
        },
        None => step.clone(),
    }
}

/// Match every property of `step` to a declared parameter.
///
/// Unexpected, duplicate and missing parameters are all collected before
/// returning.
fn bind<'a>(step: &'a CompoundFreezableStep, store: &StepFactoryStore) -> Result<Binding<'a>, Error> {
    let location = location_of(step);
    let factory = store.get(&step.name).cloned().ok_or_else(|| {
        ErrorBuilder::new(ErrorCode::StepDoesNotExist(step.name.clone())).into_error(location.clone())
    })?;

    let table = factory.parameters();
    let mut errors = ErrorBuilderList::new();
    let mut arguments: Vec<(ParameterDef, &FreezableStepProperty)> = Vec::new();

    for property in &step.properties {
        match table.find(&property.key) {
            None => errors.push(ErrorCode::UnexpectedParameter {
                step: factory.name().to_string(),
                parameter: property.key.to_string(),
            }),
            Some(def) if arguments.iter().any(|(bound, _)| bound.name == def.name) => {
                errors.push(ErrorCode::DuplicateParameter {
                    step: factory.name().to_string(),
                    parameter: def.name.clone(),
                })
            }
            Some(def) => arguments.push((def.clone(), &property.value)),
        }
    }

    for def in table.iter().filter(|def| def.required) {
        if !arguments.iter().any(|(bound, _)| bound.name == def.name) {
            errors.push(ErrorCode::MissingParameter {
                step: factory.name().to_string(),
                parameter: def.name.clone(),
            });
        }
    }

    if let Some(error) = errors.with_location(&location) {
        return Err(error);
    }

    arguments.sort_by_key(|(def, _)| def.position);
    Ok(Binding { factory, arguments })
}

/// The variable and body of a lambda argument. A plain step is a lambda
/// over the implicit variable.
fn lambda_parts(property: &FreezableStepProperty) -> Option<(VariableName, &FreezableStep)> {
    match property {
        FreezableStepProperty::Lambda { variable, body, .. } => Some((
            variable.clone().unwrap_or_else(VariableName::item),
            body.as_ref(),
        )),
        FreezableStepProperty::Step { step } => Some((VariableName::item(), step.as_ref())),
        _ => None,
    }
}

fn is_automatic(step: &CompoundFreezableStep) -> bool {
    step.name.eq_ignore_ascii_case(GET_AUTOMATIC_VARIABLE)
}

fn get_variable_node(name: &VariableName, location: Option<TextLocation>) -> FreezableStep {
    FreezableStep::Compound(CompoundFreezableStep {
        name: GET_VARIABLE.to_string(),
        properties: vec![super::ast::StepProperty::new(
            "Variable",
            FreezableStepProperty::Variable {
                name: name.clone(),
                location: location.clone(),
            },
        )],
        configuration: None,
        location,
    })
}

fn array_node(steps: &[FreezableStep], location: Option<TextLocation>) -> FreezableStep {
    FreezableStep::Compound(CompoundFreezableStep {
        name: ARRAY_NEW.to_string(),
        properties: vec![super::ast::StepProperty::new(
            "Elements",
            FreezableStepProperty::StepList {
                steps: steps.to_vec(),
                location: location.clone(),
            },
        )],
        configuration: None,
        location,
    })
}

/* ===================== Type Inference ===================== */

fn list_type(steps: &[FreezableStep], resolver: &TypeResolver) -> Result<TypeReference, Error> {
    if steps.is_empty() {
        return Ok(TypeReference::array(TypeReference::Any));
    }

    let mut errors = ErrorCollector::new();
    let members: Vec<TypeReference> = steps
        .iter()
        .filter_map(|s| errors.take(s.output_type_reference(resolver)))
        .collect();
    errors.finish()?;
    Ok(TypeReference::array(TypeReference::multiple(members)))
}

/// The type an argument contributes to its step's output rule
fn argument_type(
    def: &ParameterDef,
    property: &FreezableStepProperty,
    resolver: &TypeResolver,
) -> Result<TypeReference, Error> {
    if def.kind == ParameterKind::Lambda {
        return match lambda_parts(property) {
            Some((variable, body)) => {
                body.output_type_reference(&resolver.with_automatic_variable(variable))
            }
            None => Ok(TypeReference::Unknown),
        };
    }

    match property {
        FreezableStepProperty::Variable { name, .. } => Ok(TypeReference::Variable(name.clone())),
        FreezableStepProperty::Step { step } => step.output_type_reference(resolver),
        FreezableStepProperty::StepList { steps, .. } => list_type(steps, resolver),
        FreezableStepProperty::Lambda { .. } => Ok(TypeReference::Unknown),
    }
}

fn compound_output_reference(
    step: &CompoundFreezableStep,
    resolver: &TypeResolver,
) -> Result<TypeReference, Error> {
    let location = location_of(step);
    if is_automatic(step) {
        return OutputRule::AutomaticVariable
            .evaluate(|_| None, resolver)
            .map_err(|b| b.into_error(location));
    }

    let binding = bind(step, resolver.store())?;
    let mut types: BTreeMap<String, TypeReference> = BTreeMap::new();
    let mut errors = ErrorCollector::new();

    for (def, property) in &binding.arguments {
        let Some(actual) = errors.take(argument_type(def, property, resolver)) else {
            continue;
        };

        if def.kind != ParameterKind::VariableName {
            let caller = CallerMetadata::for_parameter(binding.factory.name(), def);
            if let Err(builder) = caller.check_allows(&actual, resolver) {
                errors.push(builder.into_error(argument_location(property, &location)));
            }
        }
        types.insert(def.name.to_lowercase(), actual);
    }
    errors.finish()?;

    binding
        .factory
        .output_rule()
        .evaluate(|name| types.get(&name.to_lowercase()).cloned(), resolver)
        .map_err(|b| b.into_error(location))
}

impl FreezableStep {
    /// Infer the type this node will have once frozen
    pub fn output_type_reference(&self, resolver: &TypeResolver) -> Result<TypeReference, Error> {
        match self {
            FreezableStep::Compound(step) => compound_output_reference(step, resolver),
            FreezableStep::Constant { value, .. } => Ok(TypeReference::Actual(value.kind())),
            FreezableStep::EnumConstant { enum_type, .. } => Ok(TypeReference::Enum(
                resolver
                    .store()
                    .enum_definition(enum_type)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| enum_type.clone()),
            )),
            FreezableStep::CreateEntity { .. } => Ok(TypeReference::Actual(ActualKind::Entity)),
            FreezableStep::Options { options, .. } => {
                let mut first_error = None;
                let mut candidates = Vec::new();
                for option in options {
                    match option.output_type_reference(resolver) {
                        Ok(reference) => candidates.push(reference),
                        Err(error) => {
                            first_error.get_or_insert(error);
                        }
                    }
                }
                match (candidates.is_empty(), first_error) {
                    (true, Some(error)) => Err(error),
                    _ => Ok(TypeReference::multiple(candidates)),
                }
            }
        }
    }
}

/* ===================== Variable Usage ===================== */

fn property_variables(
    caller: &CallerMetadata,
    property: &FreezableStepProperty,
    resolver: &TypeResolver,
) -> Result<Vec<UsedVariable>, Error> {
    match property {
        FreezableStepProperty::Variable { name, location } => {
            Ok(vec![UsedVariable::read(name.clone(), location.clone())])
        }
        FreezableStepProperty::Step { step } => step.get_variables_used(caller, resolver),
        FreezableStepProperty::StepList { steps, .. } => {
            let mut errors = ErrorCollector::new();
            let used: Vec<UsedVariable> = steps
                .iter()
                .filter_map(|s| errors.take(s.get_variables_used(caller, resolver)))
                .flatten()
                .collect();
            errors.finish()?;
            Ok(used)
        }
        FreezableStepProperty::Lambda { .. } => Ok(Vec::new()),
    }
}

fn automatic_read(step: &CompoundFreezableStep, resolver: &TypeResolver) -> Vec<UsedVariable> {
    resolver
        .automatic_variable()
        .map(|name| vec![UsedVariable::read(name.clone(), step.location.clone())])
        .unwrap_or_default()
}

fn compound_variables(
    step: &CompoundFreezableStep,
    resolver: &TypeResolver,
) -> Result<Vec<UsedVariable>, Error> {
    if is_automatic(step) {
        return Ok(automatic_read(step, resolver));
    }

    let binding = bind(step, resolver.store())?;
    let mut used = Vec::new();
    let mut errors = ErrorCollector::new();

    let variable_argument = |name: &str| match binding.argument(name) {
        Some((_, FreezableStepProperty::Variable { name, location })) => {
            Some((name.clone(), location.clone()))
        }
        _ => None,
    };

    match binding.factory.variable_usage() {
        VariableUsage::None => {}
        VariableUsage::ReadsAutomatic => used.extend(automatic_read(step, resolver)),
        VariableUsage::Reads(parameter) => {
            if let Some((name, location)) = variable_argument(parameter) {
                used.push(UsedVariable::read(name, location));
            }
        }
        VariableUsage::Writes { variable, value } => {
            if let Some((name, location)) = variable_argument(variable) {
                let written = binding
                    .argument(value)
                    .and_then(|(def, property)| argument_type(def, property, resolver).ok())
                    .unwrap_or(TypeReference::Unknown);
                used.push(UsedVariable::write(name, written, location));
            }
        }
    }

    for (def, property) in &binding.arguments {
        let caller = CallerMetadata::for_parameter(binding.factory.name(), def);
        match def.kind {
            ParameterKind::VariableName => {}
            ParameterKind::Lambda => {
                let Some((variable, body)) = lambda_parts(property) else {
                    continue;
                };

                let member = match def.lambda_input.as_deref().and_then(|i| binding.argument(i)) {
                    Some((input_def, input)) => argument_type(input_def, input, resolver)
                        .ok()
                        .and_then(|t| t.try_array_member_type(resolver).ok())
                        .unwrap_or(TypeReference::Unknown),
                    None => TypeReference::Any,
                };
                used.push(UsedVariable::write(
                    variable.clone(),
                    member,
                    property.location().cloned(),
                ));

                let scoped = resolver.with_automatic_variable(variable);
                if let Some(inner) = errors.take(body.get_variables_used(&caller, &scoped)) {
                    used.extend(inner);
                }
            }
            ParameterKind::Scalar | ParameterKind::List => {
                if let Some(inner) = errors.take(property_variables(&caller, property, resolver)) {
                    used.extend(inner);
                }
            }
        }
    }

    errors.finish()?;
    Ok(used)
}

impl FreezableStep {
    /// Every variable read or written in this subtree.
    ///
    /// Errors from every child are combined rather than stopping at the first.
    pub fn get_variables_used(
        &self,
        caller: &CallerMetadata,
        resolver: &TypeResolver,
    ) -> Result<Vec<UsedVariable>, Error> {
        match self {
            FreezableStep::Compound(step) => compound_variables(step, resolver),
            FreezableStep::Constant { .. } | FreezableStep::EnumConstant { .. } => Ok(Vec::new()),
            FreezableStep::CreateEntity { properties, .. } => {
                let mut errors = ErrorCollector::new();
                let mut used = Vec::new();
                for EntityProperty { key, value } in properties {
                    let caller = CallerMetadata::new("CreateEntity", key, TypeReference::Any);
                    if let Some(inner) = errors.take(property_variables(&caller, value, resolver)) {
                        used.extend(inner);
                    }
                }
                errors.finish()?;
                Ok(used)
            }
            FreezableStep::Options { options, .. } => {
                let mut first_error = None;
                let mut any_succeeded = false;
                let mut used = Vec::new();
                for option in options {
                    match option.get_variables_used(caller, resolver) {
                        Ok(inner) => {
                            any_succeeded = true;
                            used.extend(inner);
                        }
                        Err(error) => {
                            first_error.get_or_insert(error);
                        }
                    }
                }
                match (any_succeeded, first_error) {
                    (false, Some(error)) => Err(error),
                    _ => Ok(used),
                }
            }
        }
    }
}

/* ===================== Freezing ===================== */

impl FreezableStep {
    /// Bind this node and everything below it into an executable step
    pub fn freeze(
        &self,
        caller: &CallerMetadata,
        resolver: &TypeResolver,
    ) -> Result<Box<dyn Step>, Error> {
        match self {
            FreezableStep::Compound(step) => freeze_compound(step, caller, resolver),
            FreezableStep::Constant { value, location } => {
                freeze_constant(value, location, self.error_location(), caller, resolver)
            }
            FreezableStep::EnumConstant {
                enum_type,
                value,
                location,
            } => freeze_enum(enum_type, value, location, self.error_location(), caller, resolver),
            FreezableStep::CreateEntity {
                properties,
                location,
            } => freeze_entity(properties, location, self.error_location(), caller, resolver),
            FreezableStep::Options { options, .. } => {
                freeze_options(options, self.error_location(), caller, resolver)
            }
        }
    }
}

fn freeze_constant(
    literal: &Literal,
    location: &Option<TextLocation>,
    at: ErrorLocation,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    let kind = ConcreteType::Actual(literal.kind());
    let actual = kind.to_reference();

    if caller.expected_type.allows(&actual, resolver) {
        return Ok(Box::new(ConstantStep::new(literal.to_value(), location.clone())));
    }

    if let Ok(target) = caller.expected_type.try_resolve(resolver) {
        if Value::conversion_exists(&kind, &target) {
            let converted = literal
                .to_value()
                .try_convert(&target)
                .map_err(|b| b.into_error(at))?;
            return Ok(Box::new(ConstantStep::typed(converted, target, location.clone())));
        }
    }

    Err(caller.wrong_type(actual.to_string()).into_error(at))
}

fn freeze_enum(
    enum_type: &str,
    value: &str,
    location: &Option<TextLocation>,
    at: ErrorLocation,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    let unexpected = || {
        ErrorBuilder::new(ErrorCode::UnexpectedEnumValue {
            enum_type: enum_type.to_string(),
            value: value.to_string(),
        })
        .into_error(at.clone())
    };

    let definition = resolver.store().enum_definition(enum_type).ok_or_else(unexpected)?;
    let member = definition.find(value).ok_or_else(unexpected)?;

    let actual = TypeReference::Enum(definition.name.clone());
    caller
        .check_allows(&actual, resolver)
        .map_err(|b| b.into_error(at.clone()))?;

    Ok(Box::new(ConstantStep::new(
        Value::Enum(EnumValue {
            enum_type: definition.name.clone(),
            value: member.to_string(),
        }),
        location.clone(),
    )))
}

fn freeze_entity(
    properties: &[EntityProperty],
    location: &Option<TextLocation>,
    at: ErrorLocation,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    caller
        .check_allows(&TypeReference::Actual(ActualKind::Entity), resolver)
        .map_err(|b| b.into_error(at))?;

    let mut errors = ErrorCollector::new();
    let mut frozen = Vec::with_capacity(properties.len());
    for EntityProperty { key, value } in properties {
        let property_caller = CallerMetadata::new("CreateEntity", key, TypeReference::Any);
        if let Some(step) = errors.take(freeze_scalar(value, &property_caller, resolver)) {
            frozen.push((key.clone(), step));
        }
    }
    errors.finish()?;

    if resolver.fold_constants() {
        let constants: Option<Vec<(String, Value)>> = frozen
            .iter()
            .map(|(k, s)| s.constant_value().map(|v| (k.clone(), v.clone())))
            .collect();
        if let Some(pairs) = constants {
            debug!(properties = pairs.len(), "folded constant entity");
            return Ok(Box::new(ConstantStep::new(
                Value::Entity(Entity::from_pairs(pairs)),
                location.clone(),
            )));
        }
    }

    Ok(Box::new(CreateEntityStep::new(frozen, location.clone())))
}

/// Try each alternative in order and return the first that freezes.
///
/// When all fail, the alternative that would have frozen had the expected
/// type been `Any` reports its original error; otherwise the first
/// alternative's error is reported.
fn freeze_options(
    options: &[FreezableStep],
    at: ErrorLocation,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    let mut failures = Vec::with_capacity(options.len());
    for (index, option) in options.iter().enumerate() {
        match option.freeze(caller, resolver) {
            Ok(step) => {
                debug!(option = index, step = %option.step_name(), "chose option");
                return Ok(step);
            }
            Err(error) => failures.push(error),
        }
    }

    if caller.expected_type != TypeReference::Any {
        let relaxed = caller.with_expected(TypeReference::Any);
        for (index, (option, error)) in options.iter().zip(failures.iter()).enumerate() {
            if option.freeze(&relaxed, resolver).is_ok() {
                debug!(option = index, "option freezes under a relaxed type");
                return Err(error.clone());
            }
        }
    }

    Err(failures.into_iter().next().unwrap_or_else(|| {
        ErrorBuilder::new(ErrorCode::CannotInferType("an empty set of options".to_string()))
            .into_error(at)
    }))
}

/// Freeze a property supplied for a scalar parameter. Variables become
/// `GetVariable` steps and step lists become `ArrayNew` steps.
fn freeze_scalar(
    property: &FreezableStepProperty,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    match property {
        FreezableStepProperty::Variable { name, location } => {
            get_variable_node(name, location.clone()).freeze(caller, resolver)
        }
        FreezableStepProperty::Step { step } => step.freeze(caller, resolver),
        FreezableStepProperty::StepList { steps, location } => {
            array_node(steps, location.clone()).freeze(caller, resolver)
        }
        FreezableStepProperty::Lambda { location, .. } => Err(caller
            .wrong_type("a lambda")
            .into_error(ErrorLocation::new(caller.step_name.clone(), location.clone()))),
    }
}

fn freeze_argument(
    def: &ParameterDef,
    property: &FreezableStepProperty,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
    at: &ErrorLocation,
) -> Result<FrozenArgument, Error> {
    let here = || argument_location(property, at);

    match def.kind {
        ParameterKind::VariableName => match property {
            FreezableStepProperty::Variable { name, .. } => {
                Ok(FrozenArgument::VariableName(name.clone()))
            }
            _ => Err(caller.wrong_type("a step").into_error(here())),
        },
        ParameterKind::Lambda => {
            let (variable, body) = lambda_parts(property)
                .ok_or_else(|| caller.wrong_type("a variable").into_error(here()))?;
            let scoped = resolver.with_automatic_variable(variable.clone());
            let body = body.freeze(caller, &scoped)?;
            Ok(FrozenArgument::Lambda(LambdaFunction { variable, body }))
        }
        ParameterKind::List => match property {
            FreezableStepProperty::StepList { steps, .. } => {
                let member = caller.with_expected(def.type_reference.clone());
                let mut errors = ErrorCollector::new();
                let frozen: Vec<Box<dyn Step>> = steps
                    .iter()
                    .filter_map(|s| errors.take(s.freeze(&member, resolver)))
                    .collect();
                errors.finish()?;
                Ok(FrozenArgument::StepList(frozen))
            }
            other => freeze_scalar(other, caller, resolver).map(FrozenArgument::Step),
        },
        ParameterKind::Scalar => freeze_scalar(property, caller, resolver).map(FrozenArgument::Step),
    }
}

fn freeze_automatic(
    step: &CompoundFreezableStep,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    match resolver.automatic_variable() {
        Some(name) => get_variable_node(name, step.location.clone()).freeze(caller, resolver),
        None => Err(ErrorBuilder::new(ErrorCode::CannotInferType(
            TypeReference::AutomaticVariable.to_string(),
        ))
        .into_error(location_of(step))),
    }
}

fn freeze_compound(
    step: &CompoundFreezableStep,
    caller: &CallerMetadata,
    resolver: &TypeResolver,
) -> Result<Box<dyn Step>, Error> {
    if is_automatic(step) {
        return freeze_automatic(step, caller, resolver);
    }

    let location = location_of(step);
    let binding = bind(step, resolver.store())?;
    let factory_name = binding.factory.name().to_string();

    // The caller's expected type must admit what this step can produce
    if let Ok(reference) = compound_output_reference(step, resolver) {
        caller
            .check_allows(&reference, resolver)
            .map_err(|b| b.into_error(location.clone()))?;
    }

    let mut errors = ErrorCollector::new();
    let mut arguments = Vec::with_capacity(binding.arguments.len());
    for (def, property) in &binding.arguments {
        let argument_caller = CallerMetadata::for_parameter(&factory_name, def);
        let frozen = freeze_argument(def, property, &argument_caller, resolver, &location);
        if let Some(argument) = errors.take(frozen) {
            arguments.push((def.name.clone(), argument));
        }
    }
    errors.finish()?;

    let output_type = binding
        .factory
        .output_rule()
        .evaluate(
            |name| {
                arguments
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, a): &(String, FrozenArgument)| a.type_reference())
            },
            resolver,
        )
        .and_then(|reference| reference.try_resolve(resolver))
        .map_err(|b| b.into_error(location.clone()))?;

    caller
        .check_allows(&output_type.to_reference(), resolver)
        .map_err(|b| b.into_error(location.clone()))?;

    let compound = CompoundStep {
        factory: binding.factory.clone(),
        arguments,
        output_type,
        location: step.location.clone(),
        configuration: step.configuration.clone(),
    };

    Ok(fold(compound, resolver))
}

/* ===================== Constant Folding ===================== */

/// Replace a pure step whose arguments are all constant by its value.
/// A step that fails to evaluate is kept so the failure surfaces at run time.
fn fold(step: CompoundStep, resolver: &TypeResolver) -> Box<dyn Step> {
    if !resolver.fold_constants() || !step.factory.is_pure() {
        return Box::new(step);
    }
    if !step.arguments.iter().all(|(_, a)| a.constant_value().is_some()) {
        return Box::new(step);
    }

    let mut state = RootState::empty();
    let folded = step
        .run(&mut state, &CancellationToken::new())
        .map_err(|e| e.to_string())
        .and_then(|value| value.try_convert(&step.output_type).map_err(|b| b.to_string()));

    match folded {
        Ok(value) => {
            debug!(step = %step.name(), value = %value, "folded constant step");
            Box::new(ConstantStep::typed(
                value,
                step.output_type.clone(),
                step.location.clone(),
            ))
        }
        Err(reason) => {
            debug!(step = %step.name(), %reason, "step not folded");
            Box::new(step)
        }
    }
}
