// ABOUTME: App Engine shipper: renders app.yaml and runs `gcloud app deploy`.
// ABOUTME: The rendered file is placed in the working directory and removed after the deploy.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_yaml::Mapping;
use tokio::process::Command;

use super::{ConfigError, command, parse_options};
use crate::engine::{ShipContext, ShipError, Shipper};
use crate::types::TargetName;

pub const KIND: &str = "app-engine";

/// gcloud deploys the directory holding this file.
pub const APP_YAML: &str = "app.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppEngineOptions {
    /// Prebuilt image to deploy, without tag.
    #[serde(default)]
    pub image: Option<String>,
    /// Body of the generated app.yaml.
    #[serde(default)]
    pub gcloud: Mapping,
}

#[derive(Debug)]
pub struct AppEngineShipper {
    target: TargetName,
    options: AppEngineOptions,
}

impl AppEngineShipper {
    pub fn new(target: TargetName, options: AppEngineOptions) -> Self {
        Self { target, options }
    }

    pub fn from_options(
        target: &TargetName,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let options = parse_options(target, KIND, options)?;
        Ok(Arc::new(Self::new(target.clone(), options)))
    }

    /// `image:tag` when both are known, the bare image when only it is.
    pub fn image_url(&self, image_tag: Option<&str>) -> Option<String> {
        let image = self.options.image.as_deref().filter(|i| !i.is_empty())?;
        Some(match image_tag {
            Some(tag) => format!("{image}:{tag}"),
            None => image.to_string(),
        })
    }
}

#[async_trait]
impl Shipper for AppEngineShipper {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn ship_it(&self, ctx: &ShipContext) -> Result<(), ShipError> {
        if ctx.is_cancelled() {
            tracing::info!(target_name = %self.target, "cancelled before deploy");
            return Ok(());
        }

        let body = serde_yaml::to_string(&self.options.gcloud)
            .map_err(|e| ShipError::Config(format!("cannot render {APP_YAML}: {e}")))?;
        let _app_yaml = RenderedAppYaml::create(Path::new(APP_YAML), body.as_bytes())?;

        let mut cmd = Command::new("gcloud");
        cmd.args(["app", "deploy", "--quiet"]);
        let mut shown = "gcloud app deploy --quiet".to_string();
        if let Some(url) = self.image_url(ctx.options().image_tag.as_deref()) {
            cmd.arg("--image-url").arg(&url);
            shown.push_str(&format!(" --image-url {url}"));
        }

        tracing::info!(target_name = %self.target, "deploying to App Engine");
        command::run(cmd, &shown).await
    }

    // App Engine keeps serving the previous version until traffic migrates.
    async fn rollback(&self, _ctx: &ShipContext) -> Result<(), ShipError> {
        Ok(())
    }
}

/// A rendered app.yaml that is deleted when dropped.
#[derive(Debug)]
struct RenderedAppYaml {
    path: PathBuf,
}

impl RenderedAppYaml {
    /// Write `body` to `path`, refusing to replace an existing file.
    fn create(path: &Path, body: &[u8]) -> Result<Self, ShipError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::Builder::new()
            .prefix(".app-yaml-")
            .tempfile_in(dir)?;
        staged.write_all(body)?;

        staged.persist_noclobber(path).map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => ShipError::Config(format!(
                "{} already exists; remove it so the generated one can be used",
                path.display()
            )),
            _ => ShipError::Io(e.error),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for RenderedAppYaml {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove app.yaml");
        }
    }
}
