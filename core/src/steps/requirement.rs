//! Requirements and per-step configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// A connector version/feature gate a step declares against the settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub connector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Requirement {
    pub fn connector(name: impl Into<String>) -> Self {
        Self {
            connector: name.into(),
            min_version: None,
            max_version: None,
            features: Vec::new(),
        }
    }

    pub fn min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }

    pub fn max_version(mut self, version: impl Into<String>) -> Self {
        self.max_version = Some(version.into());
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.connector)?;
        match (&self.min_version, &self.max_version) {
            (Some(min), Some(max)) => write!(f, " {}..{}", min, max)?,
            (Some(min), None) => write!(f, " >= {}", min)?,
            (None, Some(max)) => write!(f, " <= {}", max)?,
            (None, None) => {}
        }
        if !self.features.is_empty() {
            write!(f, " [{}]", self.features.join(", "))?;
        }
        Ok(())
    }
}

/// Optional settings attached to a single step by the author
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub do_not_split: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_requirements: Vec<Requirement>,
}
