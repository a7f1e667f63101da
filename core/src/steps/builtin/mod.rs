//! Step kinds of the `Core` connector

mod arrays;
mod control;
mod entities;
mod external;
mod numbers;
mod strings;
mod variables;

use std::sync::Arc;

use super::factory::StepFactory;
use crate::types::{ActualKind, TypeReference};

pub const GET_VARIABLE: &str = "GetVariable";
pub const GET_AUTOMATIC_VARIABLE: &str = "GetAutomaticVariable";
pub const ARRAY_NEW: &str = "ArrayNew";

pub use numbers::COMPARE_OPERATOR;
pub use strings::TEXT_CASE;

/// Every core step kind
pub fn all_factories() -> Vec<Arc<dyn StepFactory>> {
    let mut factories: Vec<Arc<dyn StepFactory>> = Vec::new();
    factories.extend(control::factories());
    factories.extend(variables::factories());
    factories.extend(numbers::factories());
    factories.extend(strings::factories());
    factories.extend(arrays::factories());
    factories.extend(entities::factories());
    factories.extend(external::factories());
    factories
}

fn actual(kind: ActualKind) -> TypeReference {
    TypeReference::Actual(kind)
}

fn boolean() -> TypeReference {
    actual(ActualKind::Bool)
}

fn integer() -> TypeReference {
    actual(ActualKind::Integer)
}

fn string() -> TypeReference {
    actual(ActualKind::String)
}

fn entity() -> TypeReference {
    actual(ActualKind::Entity)
}

fn any_array() -> TypeReference {
    TypeReference::array(TypeReference::Any)
}

#[cfg(test)]
mod tests;
