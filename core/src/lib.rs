//! SCL engine core
//!
//! Parsed step trees are frozen into type-checked executable steps and run
//! against a scoped variable store.
//!
//! - `types` - values, type references and the variable type resolver
//! - `errors` - located, combinable diagnostics
//! - `steps` - the step-factory registry and frozen steps
//! - `freeze` - the freezing pipeline
//! - `runtime` - variable stores, verification and execution

pub mod cli;
pub mod config;
pub mod errors;
pub mod freeze;
pub mod runtime;
pub mod steps;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use errors::{Error, ErrorBuilder, ErrorCode, ErrorLocation, TextLocation};
pub use freeze::{freeze_top_level, FreezableStep};
pub use steps::{Step, StepFactoryStore};
pub use types::{TypeReference, Value, VariableName};
