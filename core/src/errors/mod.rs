//! Structured diagnostics shared by freezing and execution
//!
//! Errors come in two stages:
//!
//! 1. **ErrorBuilder** - an error code plus optional cause, raised before the
//!    location is known (parameter binding, value conversion, runtime checks)
//! 2. **Error** - a non-empty list of located `SingleError`s
//!
//! Freezing accumulates: independent problems in a subtree are combined into
//! one `Error` instead of stopping at the first. Execution short-circuits on
//! the first failing step.

mod location;

pub use location::{ErrorLocation, TextLocation};

use std::fmt;
use std::sync::Arc;

// ============================================================================
// Error Codes
// ============================================================================

/// Every diagnostic the engine can raise, with its message arguments.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorCode {
    // Type errors
    #[error("Could not infer type of '{0}'")]
    CannotInferType(String),
    #[error("Type of '{0}' is ambiguous")]
    AmbiguousType(String),
    #[error("'{step}' expected '{parameter}' to be {expected} but it was {actual}")]
    WrongType {
        step: String,
        parameter: String,
        expected: String,
        actual: String,
    },
    #[error("Could not cast '{value}' to {target}")]
    InvalidCast { value: String, target: String },
    #[error("'{value}' is not a member of enumeration '{enum_type}'")]
    UnexpectedEnumValue { enum_type: String, value: String },

    // Binding errors
    #[error("Missing Parameter '{parameter}' in '{step}'")]
    MissingParameter { step: String, parameter: String },
    #[error("Unexpected Parameter '{parameter}' in '{step}'")]
    UnexpectedParameter { step: String, parameter: String },
    #[error("Duplicate Parameter '{parameter}' in '{step}'")]
    DuplicateParameter { step: String, parameter: String },
    #[error("The step '{0}' does not exist")]
    StepDoesNotExist(String),
    #[error("More than one step is named '{0}'")]
    DuplicateStepName(String),

    // Resolution errors
    #[error("Could not resolve variable '<{0}>'")]
    CouldNotResolveVariable(String),
    #[error("'{0}' is a reserved variable name")]
    ReservedVariableName(String),

    // Runtime errors
    #[error("Attempt to Divide by Zero")]
    DivideByZero,
    #[error("Index {index} was out of bounds for an array of length {length}")]
    IndexOutOfBounds { index: i64, length: usize },
    #[error("Assertion Failed: {0}")]
    AssertionFailed(String),
    #[error("Variable '<{0}>' does not exist")]
    MissingVariable(String),
    #[error("Variable '<{name}>' should be {expected} but was {actual}")]
    WrongVariableType {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("External process '{path}' failed: {message}")]
    ExternalProcessError { path: String, message: String },
    #[error("The run was cancelled")]
    Cancelled,
    #[error("Could not get context '{0}'")]
    MissingContext(String),

    // Requirement errors
    #[error("'{step}' requires {requirement}")]
    RequirementsNotMet { step: String, requirement: String },
}

impl ErrorCode {
    /// Stable code name, independent of the message arguments
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::CannotInferType(_) => "CannotInferType",
            ErrorCode::AmbiguousType(_) => "AmbiguousType",
            ErrorCode::WrongType { .. } => "WrongType",
            ErrorCode::InvalidCast { .. } => "InvalidCast",
            ErrorCode::UnexpectedEnumValue { .. } => "UnexpectedEnumValue",
            ErrorCode::MissingParameter { .. } => "MissingParameter",
            ErrorCode::UnexpectedParameter { .. } => "UnexpectedParameter",
            ErrorCode::DuplicateParameter { .. } => "DuplicateParameter",
            ErrorCode::StepDoesNotExist(_) => "StepDoesNotExist",
            ErrorCode::DuplicateStepName(_) => "DuplicateStepName",
            ErrorCode::CouldNotResolveVariable(_) => "CouldNotResolveVariable",
            ErrorCode::ReservedVariableName(_) => "ReservedVariableName",
            ErrorCode::DivideByZero => "DivideByZero",
            ErrorCode::IndexOutOfBounds { .. } => "IndexOutOfBounds",
            ErrorCode::AssertionFailed(_) => "AssertionFailed",
            ErrorCode::MissingVariable(_) => "MissingVariable",
            ErrorCode::WrongVariableType { .. } => "WrongVariableType",
            ErrorCode::ExternalProcessError { .. } => "ExternalProcessError",
            ErrorCode::Cancelled => "Cancelled",
            ErrorCode::MissingContext(_) => "MissingContext",
            ErrorCode::RequirementsNotMet { .. } => "RequirementsNotMet",
        }
    }
}

// ============================================================================
// Error Builders (no location yet)
// ============================================================================

/// Underlying fault that caused an error
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// An error whose location is not yet known.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    pub code: ErrorCode,
    pub cause: Option<Cause>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, cause: None }
    }

    /// Attach the fault that triggered this error
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_location(self, location: ErrorLocation) -> SingleError {
        SingleError {
            location,
            code: self.code,
            cause: self.cause,
        }
    }

    /// Shortcut for a one-element located error
    pub fn into_error(self, location: ErrorLocation) -> Error {
        Error::from(self.with_location(location))
    }
}

impl From<ErrorCode> for ErrorBuilder {
    fn from(code: ErrorCode) -> Self {
        ErrorBuilder::new(code)
    }
}

impl PartialEq for ErrorBuilder {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// A collection of builders raised together, e.g. by parameter binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBuilderList(Vec<ErrorBuilder>);

impl ErrorBuilderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, builder: impl Into<ErrorBuilder>) {
        self.0.push(builder.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Stamp one location onto every builder. Returns `None` when empty.
    pub fn with_location(self, location: &ErrorLocation) -> Option<Error> {
        let errors: Vec<SingleError> = self
            .0
            .into_iter()
            .map(|b| b.with_location(location.clone()))
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(Error { errors })
        }
    }
}

impl From<ErrorBuilder> for ErrorBuilderList {
    fn from(builder: ErrorBuilder) -> Self {
        Self(vec![builder])
    }
}

impl FromIterator<ErrorBuilder> for ErrorBuilderList {
    fn from_iter<I: IntoIterator<Item = ErrorBuilder>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Located Errors
// ============================================================================

/// One located diagnostic.
#[derive(Debug, Clone)]
pub struct SingleError {
    pub location: ErrorLocation,
    pub code: ErrorCode,
    pub cause: Option<Cause>,
}

impl SingleError {
    /// Message, location and cause on one line
    pub fn render(&self) -> String {
        let mut out = format!("{} [{}] ({})", self.code, self.code.code(), self.location);
        if let Some(cause) = &self.cause {
            out.push_str(&format!(": {}", cause));
        }
        out
    }
}

impl PartialEq for SingleError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.location == other.location
    }
}

impl fmt::Display for SingleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// A non-empty, flat list of located errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    errors: Vec<SingleError>,
}

impl Error {
    /// Combine errors into one flat list. Returns `None` if there were none.
    pub fn combine(errors: impl IntoIterator<Item = Error>) -> Option<Error> {
        let errors: Vec<SingleError> = errors.into_iter().flat_map(|e| e.errors).collect();

        if errors.is_empty() {
            None
        } else {
            Some(Error { errors })
        }
    }

    /// Append another error's members after this one's
    pub fn merge(mut self, other: Error) -> Error {
        self.errors.extend(other.errors);
        self
    }

    pub fn errors(&self) -> &[SingleError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Stable codes of every member, in order
    pub fn codes(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.code.code()).collect()
    }

    /// Fill in `location` on members whose location is still unknown
    pub fn with_default_location(mut self, location: &ErrorLocation) -> Error {
        for error in &mut self.errors {
            if error.location.is_unknown() {
                error.location = location.clone();
            }
        }
        self
    }

    /// Every member on its own line, with locations
    pub fn render(&self) -> String {
        self.errors
            .iter()
            .map(SingleError::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<SingleError> for Error {
    fn from(error: SingleError) -> Self {
        Error {
            errors: vec![error],
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for Error {}

/// Accumulates results, keeping successes and combining every failure.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<Error>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and return the success value, if any
    pub fn take<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `Err` with every recorded failure, or `Ok(())`
    pub fn finish(self) -> Result<(), Error> {
        match Error::combine(self.errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
