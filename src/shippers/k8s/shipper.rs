// ABOUTME: Kubernetes shipper: retags a labelled workload and watches its new pods.
// ABOUTME: A pre-update snapshot recorded after a successful replace drives rollback.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_yaml::Mapping;
use tokio::sync::OnceCell;

use super::client;
use super::cluster::ClusterApi;
use super::error::KubeError;
use super::options::{Credentials, KubeOptions};
use super::resource::{RolloutResource, WorkloadKind, app_selector, locate, pod_selector};
use super::watcher::{RolloutWatcher, WatchOutcome};
use super::{CRONJOB_KIND, KIND};
use crate::engine::{ShipContext, ShipError, Shipper};
use crate::shippers::{ConfigError, parse_options};
use crate::types::TargetName;

pub struct KubeShipper {
    target: TargetName,
    options: KubeOptions,
    kind: WorkloadKind,
    credentials: Credentials,
    cluster: OnceCell<Arc<dyn ClusterApi>>,
    /// Resource as it was before our replace succeeded.
    applied: Mutex<Option<RolloutResource>>,
}

impl std::fmt::Debug for KubeShipper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeShipper")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("name", &self.options.name)
            .field("namespace", &self.options.namespace)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl KubeShipper {
    /// Validate `options` for a workload of `kind`.
    pub fn new(
        target: TargetName,
        options: KubeOptions,
        kind: WorkloadKind,
    ) -> Result<Self, ConfigError> {
        let registry_kind = match kind {
            WorkloadKind::Deployment => KIND,
            WorkloadKind::CronJob => CRONJOB_KIND,
        };
        if options.server.trim().is_empty() {
            return Err(ConfigError::invalid(&target, registry_kind, "server cannot be empty"));
        }
        if options.name.trim().is_empty() {
            return Err(ConfigError::invalid(&target, registry_kind, "name cannot be empty"));
        }
        if options.image.trim().is_empty() {
            return Err(ConfigError::invalid(&target, registry_kind, "image cannot be empty"));
        }
        let credentials = options.credentials().ok_or_else(|| {
            ConfigError::invalid(
                &target,
                registry_kind,
                "no complete credentials: set username/password, token, \
                 api_cert_file/api_key_file or api_cert/api_key",
            )
        })?;

        Ok(Self {
            target,
            options,
            kind,
            credentials,
            cluster: OnceCell::new(),
            applied: Mutex::new(None),
        })
    }

    /// Use `cluster` instead of connecting from the options.
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterApi>) -> Self {
        self.cluster = OnceCell::new_with(Some(cluster));
        self
    }

    pub fn deployment_from_options(
        target: &TargetName,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let options: KubeOptions = parse_options(target, KIND, options)?;
        let kind = options.workload_kind();
        Ok(Arc::new(Self::new(target.clone(), options, kind)?))
    }

    pub fn cron_job_from_options(
        target: &TargetName,
        options: &Mapping,
    ) -> Result<Arc<dyn Shipper>, ConfigError> {
        let options: KubeOptions = parse_options(target, CRONJOB_KIND, options)?;
        if options.kind == Some(WorkloadKind::Deployment) {
            return Err(ConfigError::invalid(
                target,
                CRONJOB_KIND,
                "kind: deployment conflicts with the k8-cronjob shipper",
            ));
        }
        Ok(Arc::new(Self::new(target.clone(), options, WorkloadKind::CronJob)?))
    }

    pub fn workload_kind(&self) -> WorkloadKind {
        self.kind
    }

    /// True once a replace has succeeded in this run.
    pub fn is_rollback_eligible(&self) -> bool {
        self.applied.lock().is_some()
    }

    async fn cluster(&self) -> Result<Arc<dyn ClusterApi>, KubeError> {
        self.cluster
            .get_or_try_init(|| client::connect(&self.options, &self.credentials))
            .await
            .cloned()
    }

    async fn wait_for_rollout(
        &self,
        cluster: &dyn ClusterApi,
        stored: &RolloutResource,
        tag: &str,
        ctx: &ShipContext,
    ) -> Result<(), KubeError> {
        let expected = usize::try_from(stored.replicas().unwrap_or(1)).unwrap_or_default();
        tracing::info!(
            target_name = %self.target,
            generation = ?stored.generation(),
            expected,
            "waiting for rollout"
        );

        let events = cluster
            .watch_pods(&pod_selector(&self.options.name, tag))
            .await?;
        let outcome = RolloutWatcher::new(expected)
            .watch(events, self.options.rollout_timeout, ctx)
            .await?;

        match outcome {
            WatchOutcome::Succeeded => {
                tracing::info!(target_name = %self.target, tag, "rollout complete")
            }
            WatchOutcome::Cancelled => {
                tracing::info!(target_name = %self.target, "rollout watch cancelled")
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Shipper for KubeShipper {
    fn kind(&self) -> &'static str {
        match self.kind {
            WorkloadKind::Deployment => KIND,
            WorkloadKind::CronJob => CRONJOB_KIND,
        }
    }

    async fn ship_it(&self, ctx: &ShipContext) -> Result<(), ShipError> {
        let tag = ctx.deploy_tag(&self.options.version_file)?;
        if ctx.is_cancelled() {
            return Ok(());
        }

        let cluster = self.cluster().await?;
        let found = cluster
            .list(self.kind, &app_selector(&self.options.name))
            .await?;
        let current = locate(self.kind, &self.options.name, &self.options.namespace, found)?;

        let mut updated = current.clone();
        let containers = updated.set_image_tag(&self.options.image, &tag)?;
        tracing::debug!(
            target_name = %self.target,
            image = %self.options.image,
            tag = %tag,
            containers,
            "updated container images"
        );

        if ctx.is_cancelled() {
            return Ok(());
        }

        let stored = cluster.replace(&updated).await?;
        *self.applied.lock() = Some(current);
        tracing::info!(
            target_name = %self.target,
            kind = %self.kind,
            name = %self.options.name,
            tag = %tag,
            "resource updated"
        );

        if self.kind == WorkloadKind::CronJob {
            return Ok(());
        }
        self.wait_for_rollout(cluster.as_ref(), &stored, &tag, ctx)
            .await?;
        Ok(())
    }

    async fn rollback(&self, _ctx: &ShipContext) -> Result<(), ShipError> {
        // The next scheduled run of a CronJob picks up whatever is current.
        if self.kind == WorkloadKind::CronJob {
            return Ok(());
        }

        let previous = self.applied.lock().take();
        let Some(previous) = previous else {
            tracing::debug!(target_name = %self.target, "nothing to roll back");
            return Ok(());
        };

        let name = previous
            .name()
            .ok_or(KubeError::Unnamed { kind: self.kind })?;
        let cluster = self.cluster().await?;
        let mut current = cluster.get(self.kind, name).await?;
        current.restore_from(&previous);
        cluster.replace(&current).await?;

        tracing::info!(
            target_name = %self.target,
            name,
            version = previous.version_label().unwrap_or("none"),
            "rolled back"
        );
        Ok(())
    }
}
