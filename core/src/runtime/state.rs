//! Runtime variable stores
//!
//! A store owns every resource placed in it and disposes each exactly once,
//! when the last variable reaching it is overwritten or removed, or when the
//! owning store is disposed or dropped. Resources are compared by identity,
//! so copies of one handle under several names are released once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

use super::context::ExternalContext;
use crate::config::Config;
use crate::types::{Resource, Value, VariableName};

/// Mutable variable store threaded through every `Step::run`
pub trait StateMonad: Send {
    fn settings(&self) -> &Config;

    fn external_context(&self) -> &ExternalContext;

    fn get_variable(&self, name: &VariableName) -> Option<Value>;

    fn variable_exists(&self, name: &VariableName) -> bool;

    /// Install `value`, disposing any previous value of `name`
    fn set_variable(&mut self, name: VariableName, value: Value);

    /// Remove and dispose `name`. Returns whether it existed.
    fn remove_variable(&mut self, name: &VariableName) -> bool;

    /// Remove and dispose every variable owned by this store
    fn dispose(&mut self);

    /// Whether a variable of this store or an ancestor still reaches `resource`
    fn holds_resource(&self, resource: &Resource) -> bool;
}

fn reaches(variables: &BTreeMap<VariableName, Value>, resource: &Resource) -> bool {
    variables.values().any(|v| v.reaches(resource))
}

/// Dispose each resource of `values` once, skipping those `held` still reaches
fn release<'a>(values: impl IntoIterator<Item = &'a Value>, held: impl Fn(&Resource) -> bool) {
    let mut released: Vec<&Resource> = Vec::new();
    for value in values {
        for resource in value.resources() {
            if !released.contains(&resource) && !held(resource) {
                trace!(resource = resource.0.type_name(), "disposing resource");
                resource.0.dispose();
                released.push(resource);
            }
        }
    }
}

/* ===================== Root Store ===================== */

/// The store owned by one run
pub struct RootState {
    variables: BTreeMap<VariableName, Value>,
    settings: Arc<Config>,
    context: Arc<ExternalContext>,
}

impl RootState {
    pub fn new(settings: Arc<Config>, context: Arc<ExternalContext>) -> Self {
        Self {
            variables: BTreeMap::new(),
            settings,
            context,
        }
    }

    /// Default settings and an empty external context
    pub fn empty() -> Self {
        Self::new(Arc::new(Config::default()), Arc::new(ExternalContext::new()))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl std::fmt::Debug for RootState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootState")
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl StateMonad for RootState {
    fn settings(&self) -> &Config {
        &self.settings
    }

    fn external_context(&self) -> &ExternalContext {
        &self.context
    }

    fn get_variable(&self, name: &VariableName) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn variable_exists(&self, name: &VariableName) -> bool {
        self.variables.contains_key(name)
    }

    fn set_variable(&mut self, name: VariableName, value: Value) {
        if let Some(previous) = self.variables.insert(name, value) {
            release([&previous], |r| reaches(&self.variables, r));
        }
    }

    fn remove_variable(&mut self, name: &VariableName) -> bool {
        match self.variables.remove(name) {
            Some(value) => {
                release([&value], |r| reaches(&self.variables, r));
                true
            }
            None => false,
        }
    }

    fn dispose(&mut self) {
        let variables = std::mem::take(&mut self.variables);
        release(variables.values(), |_| false);
    }

    fn holds_resource(&self, resource: &Resource) -> bool {
        reaches(&self.variables, resource)
    }
}

impl Drop for RootState {
    fn drop(&mut self) {
        self.dispose();
    }
}

/* ===================== Scoped Store ===================== */

/// A child store for lambda and loop bodies.
///
/// Names that exist in an ancestor are read and written there. Names first
/// set inside the scope live here and are disposed when the scope ends.
///
/// Declared variables (a lambda's input) shadow the parent but are borrowed:
/// the scope never disposes them, and nothing they reach is disposed by the
/// scope while they are held. A borrowed name overwritten in the scope
/// becomes owned from then on.
pub struct ScopedState<'p> {
    parent: &'p mut dyn StateMonad,
    local: BTreeMap<VariableName, Value>,
    borrowed: BTreeSet<VariableName>,
}

impl<'p> ScopedState<'p> {
    pub fn new(parent: &'p mut dyn StateMonad, declared: Vec<(VariableName, Value)>) -> Self {
        let borrowed = declared.iter().map(|(name, _)| name.clone()).collect();
        Self {
            parent,
            local: declared.into_iter().collect(),
            borrowed,
        }
    }

    pub fn is_local(&self, name: &VariableName) -> bool {
        self.local.contains_key(name)
    }
}

impl StateMonad for ScopedState<'_> {
    fn settings(&self) -> &Config {
        self.parent.settings()
    }

    fn external_context(&self) -> &ExternalContext {
        self.parent.external_context()
    }

    fn get_variable(&self, name: &VariableName) -> Option<Value> {
        match self.local.get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.get_variable(name),
        }
    }

    fn variable_exists(&self, name: &VariableName) -> bool {
        self.local.contains_key(name) || self.parent.variable_exists(name)
    }

    fn set_variable(&mut self, name: VariableName, value: Value) {
        if !self.local.contains_key(&name) && self.parent.variable_exists(&name) {
            self.parent.set_variable(name, value);
        } else {
            let previous = self.local.insert(name.clone(), value);
            if self.borrowed.remove(&name) {
                return;
            }
            if let Some(previous) = previous {
                release([&previous], |r| self.holds_resource(r));
            }
        }
    }

    fn remove_variable(&mut self, name: &VariableName) -> bool {
        match self.local.remove(name) {
            Some(value) => {
                if !self.borrowed.remove(name) {
                    release([&value], |r| self.holds_resource(r));
                }
                true
            }
            None => self.parent.remove_variable(name),
        }
    }

    fn dispose(&mut self) {
        let local = std::mem::take(&mut self.local);
        let borrowed = std::mem::take(&mut self.borrowed);
        let (lent, owned): (Vec<_>, Vec<_>) =
            local.into_iter().partition(|(name, _)| borrowed.contains(name));

        let parent = &*self.parent;
        release(owned.iter().map(|(_, v)| v), |r| {
            lent.iter().any(|(_, v)| v.reaches(r)) || parent.holds_resource(r)
        });
    }

    fn holds_resource(&self, resource: &Resource) -> bool {
        reaches(&self.local, resource) || self.parent.holds_resource(resource)
    }
}

impl Drop for ScopedState<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}
