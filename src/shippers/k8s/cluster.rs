// ABOUTME: Narrow cluster API used by the Kubernetes shipper, plus the kube-rs implementation.
// ABOUTME: Workloads are listed, fetched and replaced by name; pods are watched by label.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, PostParams};
use kube::runtime::{WatchStreamExt, watcher};
use kube::Client;
use snafu::ResultExt;

use super::error::{ApiSnafu, KubeError, UnnamedSnafu, WatchSnafu};
use super::resource::{RolloutResource, WorkloadKind};

/// Stream of pod objects as they are added or modified.
pub type PodEventStream = BoxStream<'static, Result<Pod, KubeError>>;

/// Operations the shipper needs from a cluster, scoped to one namespace.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Resources of `kind` matching a label selector.
    async fn list(
        &self,
        kind: WorkloadKind,
        selector: &str,
    ) -> Result<Vec<RolloutResource>, KubeError>;

    /// Fetch the current state of a resource by name.
    async fn get(&self, kind: WorkloadKind, name: &str) -> Result<RolloutResource, KubeError>;

    /// Replace a resource, returning the stored object.
    async fn replace(&self, resource: &RolloutResource) -> Result<RolloutResource, KubeError>;

    /// Watch pods matching a label selector.
    async fn watch_pods(&self, selector: &str) -> Result<PodEventStream, KubeError>;
}

/// `ClusterApi` backed by a kube client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    namespace: String,
}

impl KubeCluster {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn cron_jobs(&self) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list(
        &self,
        kind: WorkloadKind,
        selector: &str,
    ) -> Result<Vec<RolloutResource>, KubeError> {
        let params = ListParams::default().labels(selector);
        let resources = match kind {
            WorkloadKind::Deployment => self
                .deployments()
                .list(&params)
                .await
                .context(ApiSnafu)?
                .items
                .into_iter()
                .map(RolloutResource::Deployment)
                .collect(),
            WorkloadKind::CronJob => self
                .cron_jobs()
                .list(&params)
                .await
                .context(ApiSnafu)?
                .items
                .into_iter()
                .map(RolloutResource::CronJob)
                .collect(),
        };
        Ok(resources)
    }

    async fn get(&self, kind: WorkloadKind, name: &str) -> Result<RolloutResource, KubeError> {
        let resource = match kind {
            WorkloadKind::Deployment => {
                RolloutResource::Deployment(self.deployments().get(name).await.context(ApiSnafu)?)
            }
            WorkloadKind::CronJob => {
                RolloutResource::CronJob(self.cron_jobs().get(name).await.context(ApiSnafu)?)
            }
        };
        Ok(resource)
    }

    async fn replace(&self, resource: &RolloutResource) -> Result<RolloutResource, KubeError> {
        let name = resource
            .name()
            .ok_or_else(|| UnnamedSnafu { kind: resource.kind() }.build())?;
        let params = PostParams::default();

        let stored = match resource {
            RolloutResource::Deployment(d) => RolloutResource::Deployment(
                self.deployments()
                    .replace(name, &params, d)
                    .await
                    .context(ApiSnafu)?,
            ),
            RolloutResource::CronJob(c) => RolloutResource::CronJob(
                self.cron_jobs()
                    .replace(name, &params, c)
                    .await
                    .context(ApiSnafu)?,
            ),
        };
        Ok(stored)
    }

    async fn watch_pods(&self, selector: &str) -> Result<PodEventStream, KubeError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let config = watcher::Config::default().labels(selector);

        let stream = watcher(api, config)
            .default_backoff()
            .applied_objects()
            .map(|event| event.context(WatchSnafu));
        Ok(stream.boxed())
    }
}
