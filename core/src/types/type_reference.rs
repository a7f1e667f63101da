//! Type reference algebra
//!
//! A `TypeReference` is "a type, possibly not yet known". It may defer to the
//! type of another variable, or describe an unresolved choice between several
//! types. Resolving a reference against a `TypeResolver` yields a
//! `ConcreteType`, which is what frozen steps carry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::resolver::TypeResolver;
use super::variable_name::VariableName;
use crate::errors::{ErrorBuilder, ErrorCode};

/* ===================== Concrete Types ===================== */

/// Primitive and entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActualKind {
    Bool,
    Integer,
    Double,
    String,
    Date,
    Entity,
}

impl fmt::Display for ActualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActualKind::Bool => "Bool",
            ActualKind::Integer => "Integer",
            ActualKind::Double => "Double",
            ActualKind::String => "String",
            ActualKind::Date => "Date",
            ActualKind::Entity => "Entity",
        };
        write!(f, "{}", name)
    }
}

/// A fully known type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConcreteType {
    Any,
    Unit,
    Actual(ActualKind),
    Enum(String),
    Array(Box<ConcreteType>),
}

impl ConcreteType {
    pub fn array(member: ConcreteType) -> Self {
        ConcreteType::Array(Box::new(member))
    }

    pub fn to_reference(&self) -> TypeReference {
        match self {
            ConcreteType::Any => TypeReference::Any,
            ConcreteType::Unit => TypeReference::Unit,
            ConcreteType::Actual(kind) => TypeReference::Actual(*kind),
            ConcreteType::Enum(id) => TypeReference::Enum(id.clone()),
            ConcreteType::Array(member) => TypeReference::array(member.to_reference()),
        }
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteType::Any => write!(f, "Any"),
            ConcreteType::Unit => write!(f, "Unit"),
            ConcreteType::Actual(kind) => write!(f, "{}", kind),
            ConcreteType::Enum(id) => write!(f, "{}", id),
            ConcreteType::Array(member) => write!(f, "Array<{}>", member),
        }
    }
}

/* ===================== Type References ===================== */

/// A type that may not be known yet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum TypeReference {
    /// Unconstrained
    Any,
    Actual(ActualKind),
    Unit,
    Enum(String),
    Array(Box<TypeReference>),
    /// Unresolved choice between several types
    Multiple(Vec<TypeReference>),
    /// The type of another variable
    Variable(VariableName),
    /// The type of the implicit lambda variable
    AutomaticVariable,
    Unknown,
}

impl TypeReference {
    pub fn array(member: TypeReference) -> Self {
        TypeReference::Array(Box::new(member))
    }

    /// Build a `Multiple`, flattening nested choices and removing duplicates.
    /// A single candidate collapses to itself; none gives `Unknown`.
    pub fn multiple(candidates: impl IntoIterator<Item = TypeReference>) -> Self {
        let mut set = BTreeSet::new();
        for candidate in candidates {
            match candidate {
                TypeReference::Multiple(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }

        match set.len() {
            0 => TypeReference::Unknown,
            1 => set.into_iter().next().unwrap_or(TypeReference::Unknown),
            _ => TypeReference::Multiple(set.into_iter().collect()),
        }
    }

    /// Integer or Double
    pub fn number() -> Self {
        TypeReference::Multiple(vec![
            TypeReference::Actual(ActualKind::Integer),
            TypeReference::Actual(ActualKind::Double),
        ])
    }

    /// Check whether a value of type `other` may be used where `self` is expected.
    ///
    /// Indirections on either side are resolved through the resolver. A
    /// reference that cannot be resolved yet is allowed; the mismatch, if
    /// any, is caught once it resolves.
    pub fn allows(&self, other: &TypeReference, resolver: &TypeResolver) -> bool {
        self.allows_inner(other, resolver, &mut BTreeSet::new())
    }

    fn allows_inner(
        &self,
        other: &TypeReference,
        resolver: &TypeResolver,
        visited: &mut BTreeSet<VariableName>,
    ) -> bool {
        // Resolve indirections on the other side first
        match other {
            TypeReference::Any | TypeReference::Unknown => return true,
            TypeReference::Variable(name) => {
                if !visited.insert(name.clone()) {
                    return true;
                }
                return match resolver.lookup(name) {
                    Some(resolved) => self.allows_inner(&resolved.to_reference(), resolver, visited),
                    None => true,
                };
            }
            TypeReference::AutomaticVariable => {
                return match resolver.automatic_variable() {
                    Some(name) => self.allows_inner(
                        &TypeReference::Variable(name.clone()),
                        resolver,
                        visited,
                    ),
                    None => true,
                };
            }
            TypeReference::Multiple(members) => {
                return members
                    .iter()
                    .any(|m| self.allows_inner(m, resolver, visited));
            }
            _ => {}
        }

        match self {
            TypeReference::Any | TypeReference::Unknown => true,
            TypeReference::Actual(kind) => {
                matches!(other, TypeReference::Actual(o) if o == kind)
            }
            TypeReference::Unit => matches!(other, TypeReference::Unit),
            TypeReference::Enum(id) => {
                matches!(other, TypeReference::Enum(o) if o.eq_ignore_ascii_case(id))
            }
            TypeReference::Array(member) => match other {
                TypeReference::Array(o) => member.allows_inner(o, resolver, visited),
                _ => false,
            },
            TypeReference::Multiple(members) => members
                .iter()
                .any(|m| m.allows_inner(other, resolver, visited)),
            TypeReference::Variable(name) => {
                if !visited.insert(name.clone()) {
                    return true;
                }
                match resolver.lookup(name) {
                    Some(resolved) => resolved.to_reference().allows_inner(other, resolver, visited),
                    None => true,
                }
            }
            TypeReference::AutomaticVariable => match resolver.automatic_variable() {
                Some(name) => TypeReference::Variable(name.clone()).allows_inner(other, resolver, visited),
                None => true,
            },
        }
    }

    /// Resolve to a concrete type.
    ///
    /// A choice between Integer and Double resolves to Double; any other
    /// choice between several concrete types cannot be inferred.
    pub fn try_resolve(&self, resolver: &TypeResolver) -> Result<ConcreteType, ErrorBuilder> {
        self.try_resolve_inner(resolver, &mut BTreeSet::new())
    }

    fn try_resolve_inner(
        &self,
        resolver: &TypeResolver,
        visited: &mut BTreeSet<VariableName>,
    ) -> Result<ConcreteType, ErrorBuilder> {
        match self {
            TypeReference::Any => Ok(ConcreteType::Any),
            TypeReference::Unit => Ok(ConcreteType::Unit),
            TypeReference::Actual(kind) => Ok(ConcreteType::Actual(*kind)),
            TypeReference::Enum(id) => Ok(ConcreteType::Enum(id.clone())),
            TypeReference::Array(member) => Ok(ConcreteType::array(
                member.try_resolve_inner(resolver, visited)?,
            )),
            TypeReference::Unknown => Err(ErrorCode::CannotInferType(self.to_string()).into()),
            TypeReference::Variable(name) => {
                if !visited.insert(name.clone()) {
                    return Err(ErrorCode::CouldNotResolveVariable(name.to_string()).into());
                }
                resolver
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| ErrorCode::CouldNotResolveVariable(name.to_string()).into())
            }
            TypeReference::AutomaticVariable => match resolver.automatic_variable() {
                Some(name) => {
                    TypeReference::Variable(name.clone()).try_resolve_inner(resolver, visited)
                }
                None => Err(ErrorCode::CannotInferType(self.to_string()).into()),
            },
            TypeReference::Multiple(members) => {
                let mut resolved = BTreeSet::new();
                for member in members {
                    resolved.insert(member.try_resolve_inner(resolver, &mut visited.clone())?);
                }
                collapse(self, resolved)
            }
        }
    }

    /// The member type, if this is an array type.
    ///
    /// An array held by a variable that is not resolved yet gives `Unknown`.
    pub fn try_array_member_type(
        &self,
        resolver: &TypeResolver,
    ) -> Result<TypeReference, ErrorBuilder> {
        self.try_array_member_inner(resolver, &mut BTreeSet::new())
    }

    fn try_array_member_inner(
        &self,
        resolver: &TypeResolver,
        visited: &mut BTreeSet<VariableName>,
    ) -> Result<TypeReference, ErrorBuilder> {
        match self {
            TypeReference::Array(member) => Ok((**member).clone()),
            TypeReference::Any => Ok(TypeReference::Any),
            TypeReference::Unknown => Ok(TypeReference::Unknown),
            TypeReference::Variable(name) => {
                if !visited.insert(name.clone()) {
                    return Err(ErrorCode::CouldNotResolveVariable(name.to_string()).into());
                }
                match resolver.lookup(name) {
                    Some(resolved) => resolved.to_reference().try_array_member_inner(resolver, visited),
                    None => Ok(TypeReference::Unknown),
                }
            }
            TypeReference::AutomaticVariable => match resolver.automatic_variable() {
                Some(name) => {
                    TypeReference::Variable(name.clone()).try_array_member_inner(resolver, visited)
                }
                None => Ok(TypeReference::Unknown),
            },
            TypeReference::Multiple(members) => {
                let candidates: Vec<TypeReference> = members
                    .iter()
                    .filter_map(|m| m.try_array_member_inner(resolver, &mut visited.clone()).ok())
                    .collect();
                if candidates.is_empty() {
                    Err(not_an_array(self))
                } else {
                    Ok(TypeReference::multiple(candidates))
                }
            }
            _ => Err(not_an_array(self)),
        }
    }
}

fn not_an_array(reference: &TypeReference) -> ErrorBuilder {
    ErrorCode::CannotInferType(format!("array member of {}", reference)).into()
}

/// Reduce a set of resolved candidates to a single concrete type
fn collapse(
    reference: &TypeReference,
    mut resolved: BTreeSet<ConcreteType>,
) -> Result<ConcreteType, ErrorBuilder> {
    if resolved.len() > 1 {
        resolved.remove(&ConcreteType::Any);
    }

    let integer = ConcreteType::Actual(ActualKind::Integer);
    let double = ConcreteType::Actual(ActualKind::Double);
    if resolved.len() == 2 && resolved.contains(&integer) && resolved.contains(&double) {
        return Ok(double);
    }

    if resolved.len() == 1 {
        if let Some(only) = resolved.into_iter().next() {
            return Ok(only);
        }
        return Err(ErrorCode::CannotInferType(reference.to_string()).into());
    }

    let actual_count = resolved
        .iter()
        .filter(|t| matches!(t, ConcreteType::Actual(_)))
        .count();

    if actual_count > 1 || resolved.is_empty() {
        Err(ErrorCode::CannotInferType(reference.to_string()).into())
    } else {
        Err(ErrorCode::AmbiguousType(reference.to_string()).into())
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeReference::Any => write!(f, "Any"),
            TypeReference::Actual(kind) => write!(f, "{}", kind),
            TypeReference::Unit => write!(f, "Unit"),
            TypeReference::Enum(id) => write!(f, "{}", id),
            TypeReference::Array(member) => write!(f, "Array<{}>", member),
            TypeReference::Multiple(members) => {
                let names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", names.join(" or "))
            }
            TypeReference::Variable(name) => write!(f, "typeof <{}>", name),
            TypeReference::AutomaticVariable => write!(f, "typeof <>"),
            TypeReference::Unknown => write!(f, "Unknown"),
        }
    }
}
