// ABOUTME: Shell shipper running configured bash steps in order.
// ABOUTME: Cancellation is checked before each step; the first failing step aborts the target.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use nonempty::NonEmpty;
use serde::Deserialize;
use serde_yaml::Mapping;

use super::{ConfigError, command, parse_options};
use crate::engine::{ShipContext, ShipError, Shipper, VERSION_FILE};
use crate::types::TargetName;

pub const KIND: &str = "shell";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellOptions {
    pub steps: NonEmpty<String>,
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,
}

fn default_version_file() -> PathBuf {
    PathBuf::from(VERSION_FILE)
}

#[derive(Debug)]
pub struct ShellShipper {
    target: TargetName,
    options: ShellOptions,
}

impl ShellShipper {
    pub fn new(target: TargetName, options: ShellOptions) -> Self {
        Self { target, options }
    }

    pub fn from_options(
        target: &TargetName,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let options = parse_options(target, KIND, options)?;
        Ok(Arc::new(Self::new(target.clone(), options)))
    }

    /// Steps receive the deploy tag when one can be resolved, otherwise an
    /// empty string.
    fn tag(&self, ctx: &ShipContext) -> Result<String, ShipError> {
        match ctx.deploy_tag(&self.options.version_file) {
            Ok(tag) => Ok(tag),
            Err(ShipError::VersionFile { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(target_name = %self.target, "no deploy version available");
                Ok(String::new())
            }
            Err(ShipError::MissingVersion(path)) => {
                tracing::debug!(target_name = %self.target, path = %path.display(), "version file is empty");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Shipper for ShellShipper {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn ship_it(&self, ctx: &ShipContext) -> Result<(), ShipError> {
        let tag = self.tag(ctx)?;

        for (index, step) in self.options.steps.iter().enumerate() {
            if ctx.is_cancelled() {
                tracing::info!(target_name = %self.target, step = index, "cancelled before step");
                return Ok(());
            }

            tracing::info!(target_name = %self.target, step = index, "{step}");
            command::run(command::bash(step, &tag), step).await?;
        }

        Ok(())
    }

    async fn rollback(&self, _ctx: &ShipContext) -> Result<(), ShipError> {
        Ok(())
    }
}
