//! Fixed-point variable type resolution
//!
//! One `TypeResolver` is built per top-level freeze. It maps every variable
//! name to a concrete type by repeatedly collecting the variables a step tree
//! uses and resolving the ones whose types no longer depend on unknowns.

use std::collections::BTreeMap;
use tracing::debug;

use super::type_reference::ConcreteType;
use super::variable_name::VariableName;
use crate::errors::{Error, ErrorBuilder, ErrorCode, ErrorCollector, ErrorLocation, TextLocation};
use crate::freeze::{CallerMetadata, FreezableStep};
use crate::steps::StepFactoryStore;

/// Maps variable names to concrete types during one freeze.
#[derive(Debug, Clone)]
pub struct TypeResolver<'s> {
    store: &'s StepFactoryStore,
    dictionary: BTreeMap<VariableName, ConcreteType>,
    automatic_variable: Option<VariableName>,
    fold_constants: bool,
}

impl<'s> TypeResolver<'s> {
    pub fn new(store: &'s StepFactoryStore) -> Self {
        Self {
            store,
            dictionary: BTreeMap::new(),
            automatic_variable: None,
            fold_constants: false,
        }
    }

    /// Enable or disable constant folding while freezing with this resolver
    pub fn with_constant_folding(mut self, fold: bool) -> Self {
        self.fold_constants = fold;
        self
    }

    /// A copy of this resolver where `<>` refers to `name`
    pub fn with_automatic_variable(&self, name: VariableName) -> Self {
        let mut scoped = self.clone();
        scoped.automatic_variable = Some(name);
        scoped
    }

    pub fn store(&self) -> &'s StepFactoryStore {
        self.store
    }

    pub fn fold_constants(&self) -> bool {
        self.fold_constants
    }

    pub fn automatic_variable(&self) -> Option<&VariableName> {
        self.automatic_variable.as_ref()
    }

    pub fn lookup(&self, name: &VariableName) -> Option<&ConcreteType> {
        self.dictionary.get(name)
    }

    pub fn dictionary(&self) -> &BTreeMap<VariableName, ConcreteType> {
        &self.dictionary
    }

    /// Bind `name` to `concrete`. Returns whether the map grew.
    ///
    /// Re-binding an existing name to a different concrete type is an error.
    /// A name bound to `Any` keeps that binding.
    pub fn try_add_type(
        &mut self,
        name: &VariableName,
        concrete: ConcreteType,
    ) -> Result<bool, ErrorBuilder> {
        match self.dictionary.get(name) {
            Some(existing) if *existing == concrete => Ok(false),
            Some(ConcreteType::Any) => Ok(false),
            Some(existing) if concrete == ConcreteType::Any => {
                debug!(variable = %name, existing = %existing, "ignoring Any for typed variable");
                Ok(false)
            }
            Some(existing) => Err(ErrorCode::CannotInferType(format!(
                "<{}> (it is both {} and {})",
                name, existing, concrete
            ))
            .into()),
            None => {
                self.dictionary.insert(name.clone(), concrete);
                Ok(true)
            }
        }
    }

    /// Resolve the types of every variable used in `step`.
    ///
    /// Each pass collects the used variables and binds every written
    /// variable whose type now resolves. Passes repeat while the map keeps
    /// growing; a pass that adds nothing while writes remain unresolved ends
    /// with `CouldNotResolveVariable` for each of them. Variables that are
    /// read but never written are reported the same way.
    ///
    /// Returns the number of passes performed.
    pub fn try_add_type_hierarchy(
        &mut self,
        step: &FreezableStep,
        caller: &CallerMetadata,
    ) -> Result<usize, Error> {
        let mut passes = 0;

        loop {
            passes += 1;
            let used = step.get_variables_used(caller, self)?;

            let mut errors = ErrorCollector::new();
            let mut grew = false;
            let mut unresolved: BTreeMap<VariableName, Option<TextLocation>> = BTreeMap::new();
            let mut reads: BTreeMap<VariableName, Option<TextLocation>> = BTreeMap::new();

            for usage in used {
                if !usage.was_set {
                    reads.entry(usage.name).or_insert(usage.location);
                    continue;
                }

                match usage.type_reference.try_resolve(self) {
                    Ok(concrete) => match self.try_add_type(&usage.name, concrete) {
                        Ok(added) => grew |= added,
                        Err(builder) => errors.push(
                            builder.into_error(ErrorLocation::from_text(usage.location.clone())),
                        ),
                    },
                    Err(_) => {
                        unresolved.entry(usage.name).or_insert(usage.location);
                    }
                }
            }

            errors.finish()?;
            unresolved.retain(|name, _| !self.dictionary.contains_key(name));

            debug!(
                pass = passes,
                resolved = self.dictionary.len(),
                unresolved = unresolved.len(),
                "type resolution pass"
            );

            if unresolved.is_empty() {
                let missing = reads
                    .into_iter()
                    .filter(|(name, _)| !self.dictionary.contains_key(name))
                    .map(|(name, location)| could_not_resolve(name, location));

                return match Error::combine(missing) {
                    Some(e) => Err(e),
                    None => Ok(passes),
                };
            }

            if !grew {
                let errors = unresolved
                    .into_iter()
                    .map(|(name, location)| could_not_resolve(name, location));
                return match Error::combine(errors) {
                    Some(e) => Err(e),
                    None => Ok(passes),
                };
            }
        }
    }
}

fn could_not_resolve(name: VariableName, location: Option<TextLocation>) -> Error {
    ErrorBuilder::new(ErrorCode::CouldNotResolveVariable(name.to_string()))
        .into_error(ErrorLocation::from_text(location))
}
