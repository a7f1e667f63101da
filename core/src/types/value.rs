//! Runtime value types
//!
//! `Value` is a closed union over every kind of value a step can produce.
//! Conversions between kinds are explicit, one function per pair.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::type_reference::{ActualKind, ConcreteType};
use crate::errors::{ErrorBuilder, ErrorCode};

/* ===================== Serialization Mode ===================== */

/// How values and steps render as text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeMode {
    /// Canonical literal used for comparisons and logging
    Primitive,
    /// Valid, re-parseable SCL syntax
    Source,
}

/* ===================== Disposal ===================== */

/// Implemented by values that own an external resource.
///
/// The variable store calls `dispose` exactly once for every resource it owns.
pub trait Disposable: fmt::Debug + Send + Sync {
    fn dispose(&self);

    fn type_name(&self) -> &str {
        "Resource"
    }
}

/// Shared handle to a disposable resource
#[derive(Debug, Clone)]
pub struct Resource(pub Arc<dyn Disposable>);

impl Resource {
    pub fn new(resource: impl Disposable + 'static) -> Self {
        Self(Arc::new(resource))
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/* ===================== Entities and Enums ===================== */

/// A value from an enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub enum_type: String,
    pub value: String,
}

/// An ordered set of named properties. Property names ignore case.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    properties: Vec<(String, Value)>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut entity = Entity::new();
        for (key, value) in pairs {
            entity.set(key, value);
        }
        entity
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Set a property, replacing any existing one with the same name
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self
            .properties
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(existing) => existing.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    /// Merge `other` into this entity; properties of `other` win
    pub fn combine(mut self, other: &Entity) -> Entity {
        for (key, value) in &other.properties {
            self.set(key.clone(), value.clone());
        }
        self
    }

    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/* ===================== Values ===================== */

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Enum(EnumValue),
    Entity(Entity),
    Array(Vec<Value>),
    Resource(Resource),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// The most specific type describing this value
    pub fn value_type(&self) -> ConcreteType {
        match self {
            Value::Unit => ConcreteType::Unit,
            Value::Bool(_) => ConcreteType::Actual(ActualKind::Bool),
            Value::Int(_) => ConcreteType::Actual(ActualKind::Integer),
            Value::Double(_) => ConcreteType::Actual(ActualKind::Double),
            Value::String(_) => ConcreteType::Actual(ActualKind::String),
            Value::Date(_) => ConcreteType::Actual(ActualKind::Date),
            Value::Enum(e) => ConcreteType::Enum(e.enum_type.clone()),
            Value::Entity(_) => ConcreteType::Actual(ActualKind::Entity),
            Value::Array(items) => {
                let mut member = None;
                for item in items {
                    let t = item.value_type();
                    match &member {
                        None => member = Some(t),
                        Some(existing) if *existing == t => {}
                        Some(_) => {
                            member = Some(ConcreteType::Any);
                            break;
                        }
                    }
                }
                ConcreteType::array(member.unwrap_or(ConcreteType::Any))
            }
            Value::Resource(_) => ConcreteType::Any,
        }
    }

    /// Whether this value may be held where `expected` is declared
    pub fn conforms_to(&self, expected: &ConcreteType) -> bool {
        match (expected, self) {
            (ConcreteType::Any, _) => true,
            (ConcreteType::Unit, Value::Unit) => true,
            (ConcreteType::Actual(ActualKind::Bool), Value::Bool(_)) => true,
            (ConcreteType::Actual(ActualKind::Integer), Value::Int(_)) => true,
            (ConcreteType::Actual(ActualKind::Double), Value::Double(_) | Value::Int(_)) => true,
            (ConcreteType::Actual(ActualKind::String), Value::String(_)) => true,
            (ConcreteType::Actual(ActualKind::Date), Value::Date(_)) => true,
            (ConcreteType::Actual(ActualKind::Entity), Value::Entity(_)) => true,
            (ConcreteType::Enum(id), Value::Enum(e)) => id.eq_ignore_ascii_case(&e.enum_type),
            (ConcreteType::Array(member), Value::Array(items)) => {
                items.iter().all(|i| i.conforms_to(member))
            }
            _ => false,
        }
    }

    /// Convert this value to `target`, using the explicit per-pair conversions
    pub fn try_convert(self, target: &ConcreteType) -> Result<Value, ErrorBuilder> {
        if self.conforms_to(target) {
            return match (target, self) {
                (ConcreteType::Actual(ActualKind::Double), Value::Int(i)) => {
                    Ok(Value::Double(i as f64))
                }
                (_, value) => Ok(value),
            };
        }

        match (target, self) {
            (ConcreteType::Actual(ActualKind::Date), Value::String(s)) => parse_date(&s),
            (ConcreteType::Actual(ActualKind::Integer), Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| parse_failure(&s, "Integer").with_cause(e)),
            (ConcreteType::Actual(ActualKind::Double), Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| parse_failure(&s, "Double").with_cause(e)),
            (ConcreteType::Array(member), Value::Array(items)) => items
                .into_iter()
                .map(|i| i.try_convert(member))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (target, value) => Err(invalid_cast(&value, &target.to_string())),
        }
    }

    /// Whether a conversion from `from` to `to` exists at all
    pub fn conversion_exists(from: &ConcreteType, to: &ConcreteType) -> bool {
        matches!(
            (from, to),
            (
                ConcreteType::Actual(ActualKind::Integer),
                ConcreteType::Actual(ActualKind::Double)
            ) | (
                ConcreteType::Actual(ActualKind::String),
                ConcreteType::Actual(
                    ActualKind::Date | ActualKind::Integer | ActualKind::Double
                )
            )
        )
    }

    pub fn as_bool(&self) -> Result<bool, ErrorBuilder> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(invalid_cast(other, "Bool")),
        }
    }

    pub fn as_int(&self) -> Result<i64, ErrorBuilder> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(invalid_cast(other, "Integer")),
        }
    }

    pub fn as_double(&self) -> Result<f64, ErrorBuilder> {
        match self {
            Value::Double(d) => Ok(*d),
            Value::Int(i) => Ok(*i as f64),
            other => Err(invalid_cast(other, "Double")),
        }
    }

    pub fn as_str(&self) -> Result<&str, ErrorBuilder> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(invalid_cast(other, "String")),
        }
    }

    pub fn as_date(&self) -> Result<DateTime<Utc>, ErrorBuilder> {
        match self {
            Value::Date(d) => Ok(*d),
            other => Err(invalid_cast(other, "Date")),
        }
    }

    pub fn as_entity(&self) -> Result<&Entity, ErrorBuilder> {
        match self {
            Value::Entity(e) => Ok(e),
            other => Err(invalid_cast(other, "Entity")),
        }
    }

    pub fn as_enum(&self) -> Result<&EnumValue, ErrorBuilder> {
        match self {
            Value::Enum(e) => Ok(e),
            other => Err(invalid_cast(other, "Enum")),
        }
    }

    pub fn into_array(self) -> Result<Vec<Value>, ErrorBuilder> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(invalid_cast(&other, "Array")),
        }
    }

    /// Every resource reachable from this value, inside arrays and entities too
    pub fn resources(&self) -> Vec<&Resource> {
        let mut found = Vec::new();
        self.collect_resources(&mut found);
        found
    }

    fn collect_resources<'a>(&'a self, found: &mut Vec<&'a Resource>) {
        match self {
            Value::Resource(resource) => found.push(resource),
            Value::Array(items) => items.iter().for_each(|i| i.collect_resources(found)),
            Value::Entity(entity) => entity
                .properties()
                .iter()
                .for_each(|(_, v)| v.collect_resources(found)),
            _ => {}
        }
    }

    pub fn reaches(&self, resource: &Resource) -> bool {
        self.resources().into_iter().any(|r| r == resource)
    }

    pub fn serialize(&self, mode: SerializeMode) -> String {
        match self {
            Value::Unit => match mode {
                SerializeMode::Primitive => String::new(),
                SerializeMode::Source => "()".to_string(),
            },
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Double(d) => match mode {
                SerializeMode::Primitive => d.to_string(),
                SerializeMode::Source => format!("{:?}", d),
            },
            Value::String(s) => match mode {
                SerializeMode::Primitive => s.clone(),
                SerializeMode::Source => quote(s),
            },
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Enum(e) => format!("{}.{}", e.enum_type, e.value),
            Value::Entity(entity) => {
                let properties: Vec<String> = entity
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.serialize(SerializeMode::Source)))
                    .collect();
                format!("({})", properties.join(" "))
            }
            Value::Array(items) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|i| i.serialize(SerializeMode::Source))
                    .collect();
                format!("[{}]", items.join(", "))
            }
            Value::Resource(r) => format!("{}()", r.0.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize(SerializeMode::Primitive))
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn parse_failure(s: &str, target: &str) -> ErrorBuilder {
    ErrorBuilder::new(ErrorCode::InvalidCast {
        value: s.to_string(),
        target: target.to_string(),
    })
}

/// RFC 3339, or a naive date or date-time taken as UTC
fn parse_date(s: &str) -> Result<Value, ErrorBuilder> {
    let s = s.trim();
    match DateTime::parse_from_rfc3339(s) {
        Ok(d) => Ok(Value::Date(d.with_timezone(&Utc))),
        Err(e) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
            })
            .map(|naive| Value::Date(naive.and_utc()))
            .map_err(|_| parse_failure(s, "Date").with_cause(e)),
    }
}

fn invalid_cast(value: &Value, target: &str) -> ErrorBuilder {
    ErrorCode::InvalidCast {
        value: value.serialize(SerializeMode::Source),
        target: target.to_string(),
    }
    .into()
}

/* ===================== Literals ===================== */

/// A constant as written in the source, supplied by the parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
}

impl Literal {
    pub fn kind(&self) -> ActualKind {
        match self {
            Literal::Bool(_) => ActualKind::Bool,
            Literal::Int(_) => ActualKind::Integer,
            Literal::Double(_) => ActualKind::Double,
            Literal::String(_) => ActualKind::String,
            Literal::Date(_) => ActualKind::Date,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Double(d) => Value::Double(*d),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Date(d) => Value::Date(*d),
        }
    }
}
