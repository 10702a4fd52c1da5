// ABOUTME: Static-asset shipper: optional build command, then a recursive S3 copy.
// ABOUTME: AWS credentials are optional but must be given as a complete pair.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tokio::process::Command;

use super::{ConfigError, command, parse_options};
use crate::engine::{ShipContext, ShipError, Shipper};
use crate::types::TargetName;

pub const KIND: &str = "static-copy";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticCopyOptions {
    /// Local directory holding the built assets.
    pub source: String,
    /// Destination URL, e.g. `s3://bucket/prefix`.
    pub destination: String,
    /// Command run before copying, e.g. `gulp build`.
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
struct AwsKeys {
    access_key_id: String,
    secret_access_key: String,
}

#[derive(Debug)]
pub struct StaticCopyShipper {
    target: TargetName,
    options: StaticCopyOptions,
    keys: Option<AwsKeys>,
}

impl StaticCopyShipper {
    pub fn new(target: TargetName, options: StaticCopyOptions) -> Result<Self, ConfigError> {
        let keys = match (&options.aws_access_key_id, &options.aws_secret_access_key) {
            (Some(id), Some(secret)) => Some(AwsKeys {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::invalid(
                    &target,
                    KIND,
                    "aws_access_key_id and aws_secret_access_key must be set together",
                ));
            }
        };

        if options.source.trim().is_empty() || options.destination.trim().is_empty() {
            return Err(ConfigError::invalid(
                &target,
                KIND,
                "source and destination cannot be empty",
            ));
        }

        Ok(Self {
            target,
            options,
            keys,
        })
    }

    pub fn from_options(
        target: &TargetName,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let options = parse_options(target, KIND, options)?;
        Ok(Arc::new(Self::new(target.clone(), options)?))
    }

    fn copy_command(&self) -> Command {
        let mut cmd = Command::new("aws");
        cmd.args(["s3", "cp", "--recursive"])
            .arg(&self.options.source)
            .arg(&self.options.destination);
        if let Some(keys) = &self.keys {
            cmd.env("AWS_ACCESS_KEY_ID", &keys.access_key_id)
                .env("AWS_SECRET_ACCESS_KEY", &keys.secret_access_key);
        }
        cmd
    }
}

#[async_trait]
impl Shipper for StaticCopyShipper {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn ship_it(&self, ctx: &ShipContext) -> Result<(), ShipError> {
        let tag = ctx.options().version.clone().unwrap_or_default();

        if let Some(build) = &self.options.build {
            if ctx.is_cancelled() {
                tracing::info!(target_name = %self.target, "cancelled before build");
                return Ok(());
            }
            tracing::info!(target_name = %self.target, "building assets");
            command::run(command::bash(build, &tag), build).await?;
        }

        if ctx.is_cancelled() {
            tracing::info!(target_name = %self.target, "cancelled before copy");
            return Ok(());
        }

        tracing::info!(
            target_name = %self.target,
            destination = %self.options.destination,
            "copying assets"
        );
        let display = format!(
            "aws s3 cp --recursive {} {}",
            self.options.source, self.options.destination
        );
        command::run(self.copy_command(), &display).await
    }

    async fn rollback(&self, _ctx: &ShipContext) -> Result<(), ShipError> {
        Ok(())
    }
}
