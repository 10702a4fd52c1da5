// ABOUTME: Run-scoped options and the cancellation-aware context handed to shippers.
// ABOUTME: One context per phase; the options inside are shared read-only across targets.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::ShipError;

/// Default file consulted for the deploy version when none is given.
pub const VERSION_FILE: &str = "VERSION";

/// Read-only parameters of one orchestration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Version tag to deploy. Falls back to the version file when unset.
    pub version: Option<String>,
    /// Image tag for platforms that deploy a prebuilt image (App Engine).
    pub image_tag: Option<String>,
}

impl RunOptions {
    pub fn new(version: Option<String>, image_tag: Option<String>) -> Self {
        Self {
            version: version.filter(|v| !v.trim().is_empty()),
            image_tag: image_tag.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Context passed to `Shipper::ship_it` and `Shipper::rollback`.
///
/// Cloning is cheap and every clone observes the same cancellation.
#[derive(Debug, Clone)]
pub struct ShipContext {
    options: Arc<RunOptions>,
    cancel: CancellationToken,
}

impl ShipContext {
    /// Create a context with its own, uncancelled token.
    pub fn new(options: Arc<RunOptions>) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the phase has been cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolve the tag to deploy: the explicit version, else the trimmed
    /// contents of `version_file`.
    pub fn deploy_tag(&self, version_file: &Path) -> Result<String, ShipError> {
        if let Some(version) = &self.options.version {
            return Ok(version.clone());
        }

        let contents =
            std::fs::read_to_string(version_file).map_err(|source| ShipError::VersionFile {
                path: version_file.to_path_buf(),
                source,
            })?;

        let tag = contents.trim();
        if tag.is_empty() {
            return Err(ShipError::MissingVersion(version_file.to_path_buf()));
        }
        Ok(tag.to_string())
    }
}
