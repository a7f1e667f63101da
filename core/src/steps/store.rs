//! The step-factory registry
//!
//! Built once from the settings and the available connectors, then passed
//! by reference to every freeze. Lookups ignore case.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::builtin;
use super::factory::{EnumDefinition, StepFactory};
use crate::config::{Config, ConnectorSettings, CORE_CONNECTOR};
use crate::errors::{Error, ErrorBuilder, ErrorCode, ErrorCollector, ErrorLocation};

/// A source of step factories
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// The factories this connector contributes under `settings`
    fn step_factories(&self, settings: &ConnectorSettings) -> Vec<Arc<dyn StepFactory>>;
}

/// The built-in steps
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreConnector;

impl Connector for CoreConnector {
    fn name(&self) -> &str {
        CORE_CONNECTOR
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn step_factories(&self, _settings: &ConnectorSettings) -> Vec<Arc<dyn StepFactory>> {
        builtin::all_factories()
    }
}

/// Case-insensitive map from step names to factories, plus an index of
/// every enumeration those steps use
#[derive(Clone, Default)]
pub struct StepFactoryStore {
    factories: BTreeMap<String, Arc<dyn StepFactory>>,
    enums: BTreeMap<String, EnumDefinition>,
}

impl StepFactoryStore {
    /// Register the core steps and the steps of every enabled connector
    pub fn build(config: &Config, connectors: Vec<Box<dyn Connector>>) -> Result<Self, Error> {
        let mut all: Vec<Box<dyn Connector>> = vec![Box::new(CoreConnector)];
        all.extend(connectors);

        let mut factories = Vec::new();
        for connector in &all {
            let settings = config
                .connector(connector.name())
                .cloned()
                .unwrap_or_else(|| ConnectorSettings::new(connector.version()));

            if !settings.enabled {
                warn!(connector = %connector.name(), "connector is disabled, skipping its steps");
                continue;
            }

            let contributed = connector.step_factories(&settings);
            debug!(
                connector = %connector.name(),
                steps = contributed.len(),
                "registering connector"
            );
            factories.extend(contributed);
        }

        Self::from_factories(factories)
    }

    /// The core steps under default settings
    pub fn core() -> Result<Self, Error> {
        Self::build(&Config::default(), Vec::new())
    }

    pub fn from_factories(
        factories: impl IntoIterator<Item = Arc<dyn StepFactory>>,
    ) -> Result<Self, Error> {
        let mut store = Self::default();
        let mut errors = ErrorCollector::new();

        for factory in factories {
            let key = factory.name().to_lowercase();
            if store.factories.contains_key(&key) {
                errors.push(
                    ErrorBuilder::new(ErrorCode::DuplicateStepName(factory.name().to_string()))
                        .into_error(ErrorLocation::unknown()),
                );
                continue;
            }

            for definition in factory.enum_types() {
                store
                    .enums
                    .entry(definition.name.to_lowercase())
                    .or_insert_with(|| definition.clone());
            }
            store.factories.insert(key, factory);
        }

        errors.finish()?;
        Ok(store)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn StepFactory>> {
        self.factories.get(&name.to_lowercase())
    }

    pub fn enum_definition(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(&name.to_lowercase())
    }

    /// Factories in name order
    pub fn factories(&self) -> impl Iterator<Item = &Arc<dyn StepFactory>> {
        self.factories.values()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for StepFactoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFactoryStore")
            .field("steps", &self.factories.len())
            .field("enums", &self.enums.keys().collect::<Vec<_>>())
            .finish()
    }
}
