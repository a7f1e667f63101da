//! Type definitions shared by freezing and execution
//!
//! - Variable names (case-insensitive, some reserved)
//! - Type references and concrete types
//! - The fixed-point type resolver
//! - Runtime values

pub mod resolver;
pub mod type_reference;
pub mod value;
pub mod variable_name;

pub use resolver::TypeResolver;
pub use type_reference::{ActualKind, ConcreteType, TypeReference};
pub use value::{Disposable, Entity, EnumValue, Literal, Resource, SerializeMode, Value};
pub use variable_name::VariableName;
