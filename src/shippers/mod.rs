// ABOUTME: Concrete shippers and the registry mapping kind names to constructors.
// ABOUTME: Untyped option bags are validated into typed options when a shipper is built.

pub mod app_engine;
mod command;
pub mod k8s;
pub mod null;
pub mod shell;
pub mod static_copy;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::config::TargetConfig;
use crate::engine::{Shipper, Target};
use crate::types::TargetName;

/// Errors raised while turning configuration into shippers.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("target {target}: unknown shipper kind `{kind}`")]
    UnknownKind { target: TargetName, kind: String },

    #[error("target {target}: invalid {kind} options: {message}")]
    InvalidOptions {
        target: TargetName,
        kind: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub fn invalid(target: &TargetName, kind: &'static str, message: impl Into<String>) -> Self {
        ConfigError::InvalidOptions {
            target: target.clone(),
            kind,
            message: message.into(),
        }
    }
}

/// Convert an option bag into a shipper's typed options.
pub fn parse_options<T: DeserializeOwned>(
    target: &TargetName,
    kind: &'static str,
    options: &Mapping,
) -> Result<T, ConfigError> {
    serde_yaml::from_value(Value::Mapping(options.clone()))
        .map_err(|e| ConfigError::invalid(target, kind, e.to_string()))
}

/// Builds a shipper for one target from its option bag.
pub type ShipperConstructor =
    fn(&TargetName, &Mapping) -> Result<Arc<dyn Shipper>, ConfigError>;

/// Kind name to constructor table, assembled once at startup.
#[derive(Clone, Default)]
pub struct ShipperRegistry {
    constructors: BTreeMap<&'static str, ShipperConstructor>,
}

impl ShipperRegistry {
    /// A registry with no kinds registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every built-in shipper kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register(k8s::KIND, k8s::KubeShipper::deployment_from_options)
            .register("kubernetes", k8s::KubeShipper::deployment_from_options)
            .register(k8s::CRONJOB_KIND, k8s::KubeShipper::cron_job_from_options)
            .register(shell::KIND, shell::ShellShipper::from_options)
            .register(static_copy::KIND, static_copy::StaticCopyShipper::from_options)
            .register("s3", static_copy::StaticCopyShipper::from_options)
            .register(app_engine::KIND, app_engine::AppEngineShipper::from_options)
            .register(null::KIND, null::NullShipper::from_options);
        registry
    }

    pub fn register(&mut self, kind: &'static str, constructor: ShipperConstructor) -> &mut Self {
        self.constructors.insert(kind, constructor);
        self
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    pub fn build(
        &self,
        target: &TargetName,
        kind: &str,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let constructor =
            self.constructors
                .get(kind)
                .ok_or_else(|| ConfigError::UnknownKind {
                    target: target.clone(),
                    kind: kind.to_string(),
                })?;
        constructor(target, options)
    }

    /// Build every configured target, failing on the first invalid one.
    pub fn build_targets(
        &self,
        targets: &BTreeMap<TargetName, TargetConfig>,
    ) -> Result<Vec<Target>, ConfigError> {
        targets
            .iter()
            .map(|(name, config)| {
                let shipper = self.build(name, &config.shipper, &config.options)?;
                tracing::debug!(target_name = %name, kind = shipper.kind(), "built shipper");
                Ok(Target::new(name.clone(), shipper))
            })
            .collect()
    }
}
