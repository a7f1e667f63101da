//! Step factories and their declarative parameter tables
//!
//! Every step kind is described once, at registration time, by a
//! `StepFactory`: its parameter table, how its output type follows from its
//! arguments, which variables it reads or writes, its requirements, and the
//! function that runs it.

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::requirement::Requirement;
use super::CompoundStep;
use crate::errors::{Error, ErrorBuilder};
use crate::freeze::ParameterKey;
use crate::runtime::StateMonad;
use crate::types::{TypeReference, TypeResolver, Value};

/* ===================== Parameters ===================== */

/// How an argument is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// A single step
    Scalar,
    /// A list of steps
    List,
    /// A step evaluated once per input with a bound variable
    Lambda,
    /// A bare variable name such as `<x>`
    VariableName,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::Scalar => "scalar",
            ParameterKind::List => "list",
            ParameterKind::Lambda => "lambda",
            ParameterKind::VariableName => "variable",
        };
        write!(f, "{}", name)
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub aliases: Vec<String>,
    pub required: bool,
    pub kind: ParameterKind,
    /// For lists the member type, for lambdas the body type
    pub type_reference: TypeReference,
    /// For lambdas, the list parameter whose members the lambda variable takes
    pub lambda_input: Option<String>,
    /// 1-based position for positional arguments
    pub position: usize,
}

impl ParameterDef {
    fn new(name: &str, kind: ParameterKind, type_reference: TypeReference) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            required: true,
            kind,
            type_reference,
            lambda_input: None,
            position: 0,
        }
    }

    pub fn scalar(name: &str, type_reference: TypeReference) -> Self {
        Self::new(name, ParameterKind::Scalar, type_reference)
    }

    pub fn list(name: &str, member: TypeReference) -> Self {
        Self::new(name, ParameterKind::List, member)
    }

    pub fn lambda(name: &str, body: TypeReference, input: &str) -> Self {
        let mut def = Self::new(name, ParameterKind::Lambda, body);
        def.lambda_input = Some(input.to_string());
        def
    }

    pub fn variable_name(name: &str) -> Self {
        Self::new(name, ParameterKind::VariableName, TypeReference::Any)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Exact name or alias, ignoring case
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// The type a supplied argument must have
    pub fn declared_type(&self) -> TypeReference {
        match self.kind {
            ParameterKind::List => TypeReference::array(self.type_reference.clone()),
            ParameterKind::VariableName => TypeReference::Any,
            ParameterKind::Scalar | ParameterKind::Lambda => self.type_reference.clone(),
        }
    }
}

/// Ordered parameter table of one step kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    parameters: Vec<ParameterDef>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter; its position is its index in the table, from 1
    pub fn push(&mut self, mut def: ParameterDef) {
        def.position = self.parameters.len() + 1;
        self.parameters.push(def);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.matches_name(name))
    }

    pub fn find(&self, key: &ParameterKey) -> Option<&ParameterDef> {
        match key {
            ParameterKey::Named(name) => self.get(name),
            ParameterKey::Index(position) => self.parameters.iter().find(|p| p.position == *position),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDef> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/* ===================== Output Types ===================== */

/// How a step's output type follows from its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum OutputRule {
    Fixed(TypeReference),
    /// The type of the named argument
    SameAs(String),
    /// The type of the named argument, or Unit when it is absent
    SameAsOrUnit(String),
    /// The member type of the named array argument
    MemberOf(String),
    /// The member type of the named array argument, Integer or Double
    NumericMemberOf(String),
    /// Either of two arguments' types
    CommonOf(String, String),
    /// The type of the named variable argument
    VariableOf(String),
    /// An array of the named lambda's body type
    ArrayOfLambda(String),
    /// The type of the implicit lambda variable
    AutomaticVariable,
}

impl OutputRule {
    /// Evaluate the rule given the type of each supplied argument.
    ///
    /// List arguments are `Array` of their elements' types, lambdas the type
    /// of their body and variable names `Variable(name)`.
    pub fn evaluate(
        &self,
        argument: impl Fn(&str) -> Option<TypeReference>,
        resolver: &TypeResolver,
    ) -> Result<TypeReference, ErrorBuilder> {
        let required = |name: &str| argument(name).unwrap_or(TypeReference::Unknown);

        match self {
            OutputRule::Fixed(t) => Ok(t.clone()),
            OutputRule::SameAs(p) | OutputRule::VariableOf(p) => Ok(required(p)),
            OutputRule::SameAsOrUnit(p) => Ok(argument(p).unwrap_or(TypeReference::Unit)),
            OutputRule::MemberOf(p) => required(p).try_array_member_type(resolver),
            OutputRule::NumericMemberOf(p) => match required(p).try_array_member_type(resolver)? {
                TypeReference::Any | TypeReference::Unknown => Ok(TypeReference::number()),
                member => Ok(member),
            },
            OutputRule::CommonOf(p, q) => Ok(TypeReference::multiple(
                [argument(p), argument(q)].into_iter().flatten(),
            )),
            OutputRule::ArrayOfLambda(p) => Ok(TypeReference::array(required(p))),
            OutputRule::AutomaticVariable => Ok(match resolver.automatic_variable() {
                Some(name) => TypeReference::Variable(name.clone()),
                None => TypeReference::AutomaticVariable,
            }),
        }
    }
}

/* ===================== Variable Usage ===================== */

/// Which variables a step kind reads or writes
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VariableUsage {
    #[default]
    None,
    /// Reads the variable named by this parameter
    Reads(String),
    /// Reads the implicit lambda variable
    ReadsAutomatic,
    /// Writes the variable named by `variable` with the type of `value`
    Writes { variable: String, value: String },
}

/// An enumeration used by some step parameter
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumDefinition {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// The declared spelling of `value`, ignoring case
    pub fn find(&self, value: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(value))
            .map(String::as_str)
    }
}

/* ===================== Factories ===================== */

/// Runs a frozen step of one kind
pub type StepRunner = Arc<
    dyn Fn(&CompoundStep, &mut dyn StateMonad, &CancellationToken) -> Result<Value, Error>
        + Send
        + Sync,
>;

/// Per-step-kind metadata and behaviour
pub trait StepFactory: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn parameters(&self) -> &ParameterTable;

    fn output_rule(&self) -> &OutputRule;

    fn requirements(&self) -> &[Requirement] {
        &[]
    }

    /// Pure steps with constant inputs may be folded while freezing
    fn is_pure(&self) -> bool {
        true
    }

    fn variable_usage(&self) -> &VariableUsage;

    fn enum_types(&self) -> &[EnumDefinition] {
        &[]
    }

    fn run(
        &self,
        step: &CompoundStep,
        state: &mut dyn StateMonad,
        cancel: &CancellationToken,
    ) -> Result<Value, Error>;
}

/// The standard `StepFactory`: a parameter table plus a runner function
#[derive(Clone)]
pub struct StepDefinition {
    name: String,
    description: String,
    parameters: ParameterTable,
    output_rule: OutputRule,
    requirements: Vec<Requirement>,
    pure: bool,
    usage: VariableUsage,
    enum_types: Vec<EnumDefinition>,
    runner: StepRunner,
}

impl StepDefinition {
    pub fn new(
        name: &str,
        output_rule: OutputRule,
        runner: impl Fn(&CompoundStep, &mut dyn StateMonad, &CancellationToken) -> Result<Value, Error>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            parameters: ParameterTable::new(),
            output_rule,
            requirements: Vec::new(),
            pure: true,
            usage: VariableUsage::None,
            enum_types: Vec::new(),
            runner: Arc::new(runner),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn parameter(mut self, def: ParameterDef) -> Self {
        self.parameters.push(def);
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Mark as having side effects or reading state; never folded
    pub fn impure(mut self) -> Self {
        self.pure = false;
        self
    }

    pub fn usage(mut self, usage: VariableUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn enum_type(mut self, definition: EnumDefinition) -> Self {
        self.enum_types.push(definition);
        self
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("output_rule", &self.output_rule)
            .finish_non_exhaustive()
    }
}

impl StepFactory for StepDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    fn output_rule(&self) -> &OutputRule {
        &self.output_rule
    }

    fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    fn is_pure(&self) -> bool {
        self.pure
    }

    fn variable_usage(&self) -> &VariableUsage {
        &self.usage
    }

    fn enum_types(&self) -> &[EnumDefinition] {
        &self.enum_types
    }

    fn run(
        &self,
        step: &CompoundStep,
        state: &mut dyn StateMonad,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        (self.runner)(step, state, cancel)
    }
}
