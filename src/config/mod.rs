// ABOUTME: Configuration types and parsing for shipit.yml.
// ABOUTME: Maps target names to shipper kinds and option bags, with per-environment overlays.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Mapping;

use crate::error::{Error, Result};
use crate::types::TargetName;

pub const CONFIG_FILENAME: &str = "shipit.yml";
pub const CONFIG_FILENAME_ALT: &str = "shipit.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shipit/config.yml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub targets: BTreeMap<TargetName, TargetConfig>,

    #[serde(default)]
    pub environments: HashMap<String, Environment>,
}

/// One target: which shipper to use and its untyped options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub shipper: String,
    #[serde(default)]
    pub options: Mapping,
}

/// Targets that replace or extend the base set for one environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    #[serde(default)]
    pub targets: BTreeMap<TargetName, TargetConfig>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        tracing::debug!(path = %path.display(), targets = config.targets.len(), "loaded config");
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply an environment's targets over the base set. A target defined in
    /// the environment replaces the base target of the same name entirely.
    pub fn for_environment(&self, name: &str) -> Result<Config> {
        let env = self
            .environments
            .get(name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;

        let mut merged = self.clone();
        for (target, config) in &env.targets {
            merged.targets.insert(target.clone(), config.clone());
        }
        Ok(merged)
    }

    /// Fail when there is nothing to deploy.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::NoTargets);
        }
        for (name, target) in &self.targets {
            if target.shipper.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "target {name} has no shipper kind"
                )));
            }
        }
        Ok(())
    }
}
