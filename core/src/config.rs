//! Settings for freezing and running SCL
//!
//! Settings are layered, later sources winning:
//!
//! 1. Built-in defaults (constant folding on, the `Core` connector)
//! 2. A TOML file: `--config`, else `SCL_CONFIG_PATH`, else `./scl.toml` if present
//! 3. Environment variables prefixed `SCL_`, nested with `__`
//!    (e.g. `SCL_CONNECTORS__CORE__ENABLED=false`)
//! 4. Explicit builder overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::{ErrorBuilder, ErrorCode};
use crate::steps::Requirement;

/// Name of the built-in connector
pub const CORE_CONNECTOR: &str = "Core";

/// Feature gate for running external processes
pub const EXTERNAL_PROCESS_FEATURE: &str = "ExternalProcess";

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Settings for one connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSettings {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ConnectorSettings {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            enabled: true,
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f.eq_ignore_ascii_case(feature))
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Replace constant subtrees by their value while freezing
    #[serde(default = "default_true")]
    pub constant_folding: bool,

    /// Connector settings, keyed by connector name
    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorSettings>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            constant_folding: true,
            connectors: BTreeMap::new(),
        };
        config.ensure_core_connector();
        config
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load settings from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    /// Settings for the connector called `name`, ignoring case
    pub fn connector(&self, name: &str) -> Option<&ConnectorSettings> {
        self.connectors
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn with_connector(mut self, name: impl Into<String>, settings: ConnectorSettings) -> Self {
        let name = name.into();
        self.connectors.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.connectors.insert(name, settings);
        self
    }

    fn ensure_core_connector(&mut self) {
        if self.connector(CORE_CONNECTOR).is_none() {
            self.connectors.insert(
                CORE_CONNECTOR.to_string(),
                ConnectorSettings::new(env!("CARGO_PKG_VERSION"))
                    .with_feature(EXTERNAL_PROCESS_FEATURE),
            );
        }
    }

    /// Check one requirement of the step called `step_name`
    pub fn check_requirement(
        &self,
        step_name: &str,
        requirement: &Requirement,
    ) -> Result<(), ErrorBuilder> {
        let unmet = || ErrorCode::RequirementsNotMet {
            step: step_name.to_string(),
            requirement: requirement.to_string(),
        };

        let connector = match self.connector(&requirement.connector) {
            Some(c) if c.enabled => c,
            _ => return Err(unmet().into()),
        };

        if let Some(min) = &requirement.min_version {
            if compare_versions(&connector.version, min) == std::cmp::Ordering::Less {
                return Err(unmet().into());
            }
        }

        if let Some(max) = &requirement.max_version {
            if compare_versions(&connector.version, max) == std::cmp::Ordering::Greater {
                return Err(unmet().into());
            }
        }

        if requirement.features.iter().all(|f| connector.has_feature(f)) {
            Ok(())
        } else {
            Err(unmet().into())
        }
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render settings as TOML")
    }
}

/// Compare dotted numeric versions; missing parts count as zero
fn compare_versions(left: &str, right: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };

    let (l, r) = (parse(left), parse(right));
    let len = l.len().max(r.len());
    for i in 0..len {
        let a = l.get(i).copied().unwrap_or(0);
        let b = r.get(i).copied().unwrap_or(0);
        match a.cmp(&b) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/* ===================== Builder ===================== */

/// Builder for `Config`
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    constant_folding: Option<bool>,
}

impl ConfigBuilder {
    /// Set the config file path (overrides default search)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Override constant folding
    pub fn constant_folding(mut self, fold: Option<bool>) -> Self {
        self.constant_folding = fold;
        self
    }

    pub fn build(self) -> Result<Config> {
        let mut builder = config::Config::builder()
            .set_default("constant_folding", true)
            .context("Failed to set configuration defaults")?;

        let path = self
            .config_path
            .or_else(|| std::env::var("SCL_CONFIG_PATH").ok().map(PathBuf::from));

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("scl").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("SCL")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(fold) = self.constant_folding {
            builder = builder
                .set_override("constant_folding", fold)
                .context("Failed to override constant folding")?;
        }

        let mut config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.ensure_core_connector();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_core_connector() {
        let config = Config::default();
        let core = config.connector("core").expect("core connector");
        assert!(core.enabled);
        assert!(core.has_feature(EXTERNAL_PROCESS_FEATURE));
        assert!(config.constant_folding);
    }

    #[test]
    fn test_requirement_met() {
        let config = Config::default().with_connector(
            "Files",
            ConnectorSettings::new("1.4.2").with_feature("Write"),
        );
        let requirement = Requirement::connector("Files")
            .min_version("1.2")
            .max_version("2.0")
            .feature("write");

        assert!(config.check_requirement("WriteFile", &requirement).is_ok());
    }

    #[test]
    fn test_requirement_version_too_low() {
        let config = Config::default().with_connector("Files", ConnectorSettings::new("1.1"));
        let requirement = Requirement::connector("Files").min_version("1.2");

        let err = config.check_requirement("WriteFile", &requirement).unwrap_err();
        assert_eq!(err.code.code(), "RequirementsNotMet");
    }

    #[test]
    fn test_requirement_missing_feature_or_connector() {
        let config = Config::default();
        assert!(config
            .check_requirement("X", &Requirement::connector("Core").feature("Teleport"))
            .is_err());
        assert!(config
            .check_requirement("X", &Requirement::connector("Nowhere"))
            .is_err());
    }

    #[test]
    fn test_disabled_connector_fails_requirement() {
        let mut core = ConnectorSettings::new("0.1.0");
        core.enabled = false;
        let config = Config::default().with_connector("core", core);

        assert!(config
            .check_requirement("Log", &Requirement::connector(CORE_CONNECTOR))
            .is_err());
    }

    #[test]
    fn test_compare_versions() {
        use std::cmp::Ordering;
        assert_eq!(compare_versions("1.2.0", "1.2"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.1.0-beta", "0.2"), Ordering::Less);
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
