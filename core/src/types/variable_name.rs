//! Case-insensitive variable names

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::errors::{ErrorBuilder, ErrorCode};

/// Names that can never be used for a variable
pub const RESERVED_NAMES: &[&str] = &["true", "false", "null"];

/// Name of the implicit lambda variable
pub const ITEM_NAME: &str = "item";

/// A variable name. Comparison, ordering and hashing ignore case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariableName(String);

impl VariableName {
    /// Create a variable name, rejecting reserved names
    pub fn new(name: impl Into<String>) -> Result<Self, ErrorBuilder> {
        let name = name.into();
        if RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&name))
        {
            return Err(ErrorCode::ReservedVariableName(name).into());
        }
        Ok(Self(name))
    }

    /// The implicit variable bound by lambdas that do not name one
    pub fn item() -> Self {
        Self(ITEM_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Syntax form, e.g. `<x>`
    pub fn serialize(&self) -> String {
        format!("<{}>", self.0)
    }

    fn key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for VariableName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for VariableName {}

impl Hash for VariableName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for VariableName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariableName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for VariableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VariableName::new(value).map_err(|e| e.to_string())
    }
}

impl From<VariableName> for String {
    fn from(name: VariableName) -> Self {
        name.0
    }
}
